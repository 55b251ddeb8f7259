/// Number of sigmoid table intervals.
pub const SIGMOID_TABLE_SIZE: usize = 512;

/// The sigmoid table covers *[-MAX_SIGMOID, MAX_SIGMOID]*.
pub const MAX_SIGMOID: f32 = 8.;

/// Number of log table intervals.
pub const LOG_TABLE_SIZE: usize = 512;

/// Precomputed sigmoid and logarithm tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTables {
    sigmoid: Vec<f32>,
    log: Vec<f32>,
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTables {
    pub fn new() -> Self {
        let sigmoid = (0..=SIGMOID_TABLE_SIZE)
            .map(|i| {
                let x = (i as f32 * 2. * MAX_SIGMOID) / SIGMOID_TABLE_SIZE as f32 - MAX_SIGMOID;
                1. / (1. + (-x).exp())
            })
            .collect();

        let log = (0..=LOG_TABLE_SIZE)
            .map(|i| ((i as f32 + 1e-5) / LOG_TABLE_SIZE as f32).ln())
            .collect();

        LookupTables { sigmoid, log }
    }

    /// Table approximation of the logistic function.
    pub fn sigmoid(&self, x: f32) -> f32 {
        if x < -MAX_SIGMOID {
            0.
        } else if x > MAX_SIGMOID {
            1.
        } else {
            let idx = ((x + MAX_SIGMOID) * SIGMOID_TABLE_SIZE as f32 / MAX_SIGMOID / 2.) as usize;
            self.sigmoid[idx]
        }
    }

    /// Table approximation of the natural logarithm on *(0, 1]*.
    ///
    /// Returns 0 for `x > 1`. Non-positive values are outside the
    /// domain of the table.
    pub fn log(&self, x: f32) -> f32 {
        if x > 1. {
            return 0.;
        }

        // Float to int casts saturate, so the index stays in bounds.
        let idx = (x * LOG_TABLE_SIZE as f32) as usize;
        self.log[idx]
    }
}
