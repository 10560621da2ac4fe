use crate::module::ModuleError;
use crate::store::Time;
use thiserror::Error;

/// Error type for building and running dynamical systems.
#[derive(Error, Debug)]
pub enum CropError {
    #[error("{0}")]
    Error(String),

    #[error("Unknown quantity '{0}'")]
    UnknownQuantity(String),

    #[error(
        "Module '{module}' requires '{quantity}', which is not produced by any module \
         and is not an initial value, parameter or driver"
    )]
    MissingInput { module: String, quantity: String },

    #[error("Cyclic dependency between modules: {}", modules.join(", "))]
    CyclicDependency { modules: Vec<String> },

    #[error("Quantity '{quantity}' is produced by both '{first}' and '{second}'")]
    DuplicateOutput {
        quantity: String,
        first: String,
        second: String,
    },

    #[error(
        "Derivative module '{module}' produces a rate for '{quantity}', \
         which is not a state quantity. Provide an initial value for it."
    )]
    UnknownStateQuantity { module: String, quantity: String },

    #[error(
        "\"{name}\" was given as a solver name, but no solver with that name could be found. \
         Available solvers: {}", available.join(", ")
    )]
    UnknownSolver { name: String, available: Vec<String> },

    #[error("A solver named \"{0}\" is already registered")]
    DuplicateSolver(String),

    #[error(
        "\"{name}\" was given as a module name, but no module with that name could be found"
    )]
    UnknownModule { name: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Module '{module}' failed at t={time} (evaluation {evaluations}): {source}")]
    Computation {
        module: String,
        time: Time,
        evaluations: usize,
        #[source]
        source: ModuleError,
    },

    #[error(
        "Extrapolation is not allowed. Driver '{quantity}' requested at t={time}, \
         driver range=[{start}, {end}]"
    )]
    ExtrapolationNotAllowed {
        quantity: String,
        time: Time,
        start: Time,
        end: Time,
    },

    #[error(
        "Solver '{solver}' exceeded {max_steps} steps in one output interval at t={time} \
         (evaluation {evaluations})"
    )]
    MaxStepsExceeded {
        solver: String,
        time: Time,
        evaluations: usize,
        max_steps: usize,
    },

    #[error(
        "Solver '{solver}' reduced its step size to {step_size:e} at t={time} \
         (evaluation {evaluations}) without meeting the error tolerance"
    )]
    StepSizeUnderflow {
        solver: String,
        time: Time,
        step_size: f64,
        evaluations: usize,
    },
}

impl CropError {
    /// Whether an adaptive solver gave up on its step budget rather than hitting a hard failure.
    ///
    /// Composite solvers use this to decide whether a fixed-step retry is meaningful.
    pub fn is_step_control_failure(&self) -> bool {
        matches!(
            self,
            CropError::MaxStepsExceeded { .. } | CropError::StepSizeUnderflow { .. }
        )
    }
}

/// Convenience type for `Result<T, CropError>`.
pub type CropResult<T> = Result<T, CropError>;
