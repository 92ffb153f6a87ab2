use xlnames_common::Locale;

/// What the sample statistics (`VAR.S`, `STDEV.S`) return for fewer than
/// two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleVariancePolicy {
    /// Return `0`.
    #[default]
    Zero,
    /// Return `#DIV/0!`.
    DivZero,
}

/// Evaluation settings shared by every formula an [`Evaluator`] runs.
///
/// [`Evaluator`]: crate::Evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    /// How many cell formulas and defined names may be entered recursively
    /// before evaluation fails with [`Error::Recursion`](crate::Error::Recursion).
    pub max_depth: usize,
    /// Number parsing and formatting culture.
    pub locale: Locale,
    pub sample_variance: SampleVariancePolicy,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            locale: Locale::invariant(),
            sample_variance: SampleVariancePolicy::Zero,
        }
    }
}

impl EvalConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_sample_variance(mut self, policy: SampleVariancePolicy) -> Self {
        self.sample_variance = policy;
        self
    }
}
