use crate::error::{Error, Result};

/// Tie policy of the softmax tree builder.
///
/// When the next leaf and the next internal node have the same count,
/// `PreferLeaf` merges the leaf first. `PreferNode` merges the internal
/// node first, which is what fastText's strict comparison does.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TieBreak {
    PreferLeaf,
    PreferNode,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::PreferLeaf
    }
}

/// Node of a hierarchical softmax tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub count: u64,

    /// Set for the second child of the parent.
    pub binary: bool,
}

impl Node {
    fn leaf(count: u64) -> Self {
        Node {
            parent: None,
            left: None,
            right: None,
            count,
            binary: false,
        }
    }
}

/// Hierarchical softmax tree.
///
/// The tree is a Huffman tree over the output counts. Leaves use
/// indices `[0, n)`, internal nodes `[n, 2n - 1)`, the root is the last
/// node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SoftmaxTree {
    nodes: Vec<Node>,
    paths: Vec<Vec<usize>>,
    codes: Vec<Vec<bool>>,
}

impl SoftmaxTree {
    /// Build a tree from output counts.
    ///
    /// Every internal node merges the two nodes with the lowest counts
    /// among the unmerged leaves and the internal nodes built so far.
    pub fn new(counts: &[u64], tie_break: TieBreak) -> Result<Self> {
        let n = counts.len();
        if n == 0 {
            return Err(Error::Precondition(String::from(
                "Cannot build a softmax tree without outputs",
            )));
        }

        let mut nodes: Vec<_> = counts.iter().cloned().map(Node::leaf).collect();
        nodes.reserve(n - 1);

        // Leaves are merged by increasing count. For counts in fastText's
        // (descending) dictionary order, this is the reverse index order.
        let mut leaves: Vec<_> = (0..n).collect();
        leaves.sort_by(|&a, &b| counts[a].cmp(&counts[b]).then_with(|| b.cmp(&a)));

        let mut leaf = 0;
        let mut node = n;
        for i in n..2 * n - 1 {
            let mut mini = [0; 2];
            for m in &mut mini {
                let take_leaf = leaf < n
                    && (node == i
                        || match tie_break {
                            TieBreak::PreferLeaf => {
                                nodes[leaves[leaf]].count <= nodes[node].count
                            }
                            TieBreak::PreferNode => nodes[leaves[leaf]].count < nodes[node].count,
                        });

                if take_leaf {
                    *m = leaves[leaf];
                    leaf += 1;
                } else {
                    *m = node;
                    node += 1;
                }
            }

            let count = nodes[mini[0]].count.saturating_add(nodes[mini[1]].count);
            nodes.push(Node {
                parent: None,
                left: Some(mini[0]),
                right: Some(mini[1]),
                count,
                binary: false,
            });
            nodes[mini[0]].parent = Some(i);
            nodes[mini[1]].parent = Some(i);
            nodes[mini[1]].binary = true;
        }

        let mut paths = Vec::with_capacity(n);
        let mut codes = Vec::with_capacity(n);
        for leaf in 0..n {
            let mut path = Vec::new();
            let mut code = Vec::new();
            let mut j = leaf;
            while let Some(parent) = nodes[j].parent {
                path.push(parent - n);
                code.push(nodes[j].binary);
                j = parent;
            }
            paths.push(path);
            codes.push(code);
        }

        Ok(SoftmaxTree {
            nodes,
            paths,
            codes,
        })
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.paths.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Internal node offsets from `leaf` to the root.
    pub fn path(&self, leaf: usize) -> &[usize] {
        &self.paths[leaf]
    }

    /// Branch bits from `leaf` to the root.
    pub fn code(&self, leaf: usize) -> &[bool] {
        &self.codes[leaf]
    }
}

#[cfg(test)]
mod tests {
    use super::{SoftmaxTree, TieBreak};
    use crate::error::Error;

    fn depth(tree: &SoftmaxTree, leaf: usize) -> usize {
        let mut depth = 0;
        let mut j = leaf;
        while let Some(parent) = tree.nodes()[j].parent {
            depth += 1;
            j = parent;
        }
        depth
    }

    // Follow the codes from the root and check that we end up at the leaf.
    fn check_decode(tree: &SoftmaxTree) {
        let n = tree.n_leaves();
        for leaf in 0..n {
            let path = tree.path(leaf);
            let code = tree.code(leaf);
            assert_eq!(path.len(), code.len());
            assert_eq!(path.len(), depth(tree, leaf));

            let mut node = tree.nodes().len() - 1;
            for (&offset, &bit) in path.iter().zip(code).rev() {
                assert_eq!(node - n, offset);
                let current = &tree.nodes()[node];
                let child = if bit { current.right } else { current.left };
                node = child.unwrap();
            }
            assert_eq!(node, leaf);
        }
    }

    #[test]
    fn merges_smallest_counts_first() {
        let tree = SoftmaxTree::new(&[1, 2, 3], TieBreak::PreferLeaf).unwrap();
        let nodes = tree.nodes();
        assert_eq!(nodes.len(), 5);

        assert_eq!((nodes[3].left, nodes[3].right), (Some(0), Some(1)));
        assert_eq!(nodes[3].count, 3);
        assert_eq!((nodes[4].left, nodes[4].right), (Some(2), Some(3)));
        assert_eq!(nodes[4].count, 6);
        assert_eq!(nodes[4].parent, None);

        assert_eq!(tree.path(0), &[0, 1]);
        assert_eq!(tree.code(0), &[false, true]);
        assert_eq!(tree.path(1), &[0, 1]);
        assert_eq!(tree.code(1), &[true, true]);
        assert_eq!(tree.path(2), &[1]);
        assert_eq!(tree.code(2), &[false]);

        check_decode(&tree);
    }

    #[test]
    fn legacy_tie_break_prefers_node() {
        let tree = SoftmaxTree::new(&[1, 2, 3], TieBreak::PreferNode).unwrap();
        let nodes = tree.nodes();
        assert_eq!((nodes[4].left, nodes[4].right), (Some(3), Some(2)));
        assert_eq!(tree.code(2), &[true]);
        assert_eq!(tree.code(0), &[false, false]);
        check_decode(&tree);
    }

    #[test]
    fn fasttext_order_walks_leaves_backwards() {
        let counts = [50, 20, 20, 8, 3, 3, 1];
        for &tie_break in &[TieBreak::PreferLeaf, TieBreak::PreferNode] {
            let tree = SoftmaxTree::new(&counts, tie_break).unwrap();
            assert_eq!(tree.nodes()[7].left, Some(6));
            assert_eq!(tree.nodes()[7].right, Some(5));
            assert_eq!(tree.nodes().last().unwrap().count, 105);
            check_decode(&tree);

            // Frequent outputs should not be deeper than rare outputs.
            assert!(depth(&tree, 0) <= depth(&tree, 6));
        }
    }

    #[test]
    fn deterministic() {
        let counts = [4, 4, 4, 4, 2, 2, 1, 1, 1];
        let tree = SoftmaxTree::new(&counts, TieBreak::default()).unwrap();
        assert_eq!(
            tree,
            SoftmaxTree::new(&counts, TieBreak::default()).unwrap()
        );
        check_decode(&tree);
    }

    #[test]
    fn single_leaf() {
        let tree = SoftmaxTree::new(&[42], TieBreak::default()).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert!(tree.path(0).is_empty());
        assert!(tree.code(0).is_empty());
    }

    #[test]
    fn no_leaves_fails() {
        assert!(matches!(
            SoftmaxTree::new(&[], TieBreak::default()),
            Err(Error::Precondition(_))
        ));
    }
}
