//! Error taxonomy. Each leaf maps to one of spec §7's five policies; only
//! [`FatalEnvironmentError`] ever causes the process to exit non-zero.

use thiserror::Error;

/// Top-level error type. Most call sites log and recover rather than
/// propagate this upward; it exists mainly so individual components can
/// return a typed `Result` without committing to a policy.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    Controller(#[from] ControllerProtocolError),

    #[error(transparent)]
    SurfaceBuild(#[from] SurfaceBuildError),

    #[error(transparent)]
    RendererResource(#[from] RendererResourceError),

    #[error(transparent)]
    CompositorProtocol(#[from] CompositorProtocolError),

    #[error(transparent)]
    FatalEnvironment(#[from] FatalEnvironmentError),
}

/// Malformed input from the controller. Dropped at the smallest possible
/// granularity (a line, or one sub-object within a line); never aborts.
#[derive(Debug, Error)]
pub enum ControllerProtocolError {
    #[error("malformed JSON line: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("self-contradictory size: {0}")]
    ContradictorySize(String),
}

/// A surface or block could not be built. The caller leaves a `null` at the
/// surface's index and keeps going.
#[derive(Debug, Error)]
pub enum SurfaceBuildError {
    #[error("bar or popup derived a zero size in both dimensions")]
    ZeroDerivedSize,
    #[error("no seat owns grab serial {0}")]
    UnresolvableGrabSerial(u32),
    #[error("unsupported block type: {0}")]
    UnsupportedBlockType(String),
}

/// A font or image resource failed to load. The affected block is replaced
/// with a transparent spacer of its declared size.
#[derive(Debug, Error)]
pub enum RendererResourceError {
    #[error("font initialization failed: {0}")]
    FontInit(String),
    #[error("image decode failed for {path}: {reason}")]
    ImageDecode { path: String, reason: String },
}

/// The compositor tore something down out from under us. The affected
/// subtree is destroyed and a state report is emitted.
#[derive(Debug, Error)]
pub enum CompositorProtocolError {
    #[error("layer surface closed by compositor")]
    LayerSurfaceClosed,
    #[error("popup dismissed by compositor")]
    PopupDismissed,
}

/// Unrecoverable: the process logs and exits.
#[derive(Debug, Error)]
pub enum FatalEnvironmentError {
    #[error("required Wayland global `{0}` is not advertised by the compositor")]
    MissingGlobal(&'static str),
    #[error("shared memory allocation failed: {0}")]
    ShmAllocFailed(String),
    #[error("locale is not UTF-8")]
    NonUtf8Locale,
    #[error("failed to connect to the Wayland display: {0}")]
    ConnectFailed(String),
}
