//! Rich diagnostic error types for the synthroute planner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers can tell a
//! missing target apart from a malformed bound or a broken regression model.
//!
//! Infeasible mass allocations are deliberately absent: an LP without an
//! optimum is a per-variant outcome, not an error.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the synthroute planner.
#[derive(Debug, Error, Diagnostic)]
pub enum RouteError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bounds(#[from] BoundsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error reading {path}: {source}")]
    #[diagnostic(
        code(synthroute::store::io),
        help("Check that the snapshot file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse store snapshot {path}: {message}")]
    #[diagnostic(
        code(synthroute::store::parse),
        help(
            "The snapshot must be a JSON object with `substances` and `operations` arrays. \
             Ids are positive integers."
        )
    )]
    Parse { path: String, message: String },

    #[error("inconsistent store snapshot: {message}")]
    #[diagnostic(
        code(synthroute::store::invalid),
        help(
            "Every operation needs at least one source, and every referenced substance id \
             must exist in the snapshot."
        )
    )]
    Invalid { message: String },

    #[error("graph store unavailable: {message}")]
    #[diagnostic(
        code(synthroute::store::unavailable),
        help(
            "The backing store failed transiently. No partial state was kept, \
             so the whole request can be retried."
        )
    )]
    Unavailable { message: String },
}

// ---------------------------------------------------------------------------
// Formula errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FormulaError {
    #[error("unknown element symbol: \"{symbol}\"")]
    #[diagnostic(
        code(synthroute::formula::unknown_element),
        help("Anchor elements must be periodic-table symbols such as `Al`, `Fe` or `Si`.")
    )]
    UnknownElement { symbol: String },
}

// ---------------------------------------------------------------------------
// Bound errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BoundsError {
    #[error("unsupported value format for {key}: \"{value}\"")]
    #[diagnostic(
        code(synthroute::bounds::unsupported_format),
        help("Use `>X`, `<X` or `A-B`, with percentages between 0 and 100.")
    )]
    UnsupportedFormat { key: String, value: String },

    #[error("invalid range format for {key}: \"{value}\"")]
    #[diagnostic(
        code(synthroute::bounds::invalid_range),
        help("A range is written `A-B` where both ends are numbers, e.g. `10-20`.")
    )]
    InvalidRange { key: String, value: String },

    #[error("unknown property key: \"{key}\"")]
    #[diagnostic(
        code(synthroute::bounds::unknown_key),
        help("Known keys: main_percent, fe_percent, si_percent, k_percent, ca_percent, mg_percent, na_percent.")
    )]
    UnknownKey { key: String },

    #[error("target mass must be a positive number, got {mass}")]
    #[diagnostic(
        code(synthroute::bounds::target_mass),
        help("Pass the desired product mass, e.g. `--mass 100`.")
    )]
    InvalidTargetMass { mass: f64 },
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("target substance not found: \"{formula}\"")]
    #[diagnostic(
        code(synthroute::discovery::target_not_found),
        help("List known product formulas with `synthroute targets`.")
    )]
    TargetNotFound { formula: String },

    #[error("substance not found: {id}")]
    #[diagnostic(
        code(synthroute::discovery::substance_not_found),
        help("An operation references a substance the store does not know. Check the store contents.")
    )]
    SubstanceNotFound { id: u64 },

    #[error("chain enumeration exceeded the limit of {limit} chains")]
    #[diagnostic(
        code(synthroute::discovery::chain_limit),
        help("Raise `max_chains` in the planner config, or set `max_chain_length`.")
    )]
    ChainLimitExceeded { limit: usize },

    #[error("a chain grew past the limit of {limit} operations")]
    #[diagnostic(
        code(synthroute::discovery::chain_length),
        help("Raise or remove `max_chain_length` in the planner config.")
    )]
    ChainLengthExceeded { limit: usize },
}

// ---------------------------------------------------------------------------
// Oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("unable to load complexity prediction model from {path}: {message}")]
    #[diagnostic(
        code(synthroute::oracle::load),
        help("Check the model path. The planner cannot rank chains without a model.")
    )]
    Load { path: String, message: String },

    #[error("invalid regression model: {message}")]
    #[diagnostic(
        code(synthroute::oracle::invalid_model),
        help(
            "Linear models need weights keyed by declared feature names. \
             Tree models need 2^depth leaf values per tree."
        )
    )]
    InvalidModel { message: String },

    #[error("unknown feature name: \"{name}\"")]
    #[diagnostic(
        code(synthroute::oracle::unknown_feature),
        help(
            "Declared features: temperature, MPa, hydrothermal process, vacuum, microimpurities, \
             equilibrium crystallization, nonequilibrium crystallization."
        )
    )]
    UnknownFeature { name: String },

    #[error("complexity prediction failed: {message}")]
    #[diagnostic(
        code(synthroute::oracle::prediction),
        help("The scoring oracle rejected its input. Ranking for this request was aborted.")
    )]
    Prediction { message: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(synthroute::engine::invalid_config),
        help("Check the PlannerConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(synthroute::engine::config_read),
        help("Ensure the config file exists and is readable.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(synthroute::engine::config_parse),
        help("The config file must be valid TOML matching the PlannerConfig fields.")
    )]
    ConfigParse { path: String, message: String },

    #[error("failed to write config file {path}")]
    #[diagnostic(
        code(synthroute::engine::config_write),
        help("Check write permissions on the target directory.")
    )]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pool could not be started: {message}")]
    #[diagnostic(
        code(synthroute::engine::worker_pool),
        help("Lower `worker_threads` or leave it at 0 to use one thread per core.")
    )]
    WorkerPool { message: String },

    #[error("request cancelled")]
    #[diagnostic(
        code(synthroute::engine::cancelled),
        help("Nothing was persisted; the request can be retried.")
    )]
    Cancelled,

    #[error("request exceeded its deadline")]
    #[diagnostic(
        code(synthroute::engine::timed_out),
        help("Raise `request_timeout_secs`, or narrow the request. Retrying is safe.")
    )]
    TimedOut,
}

/// Convenience alias for functions returning synthroute results.
pub type RouteResult<T> = std::result::Result<T, RouteError>;
