use crate::backend::BackendKind;

/// Errors raised by the graphics module.
///
/// `Usage` and `Unsupported` are raised before any state is modified, so the
/// operation that returned them had no effect.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsError {
    /// The caller broke an API constraint. The message names the constraint.
    Usage(String),
    /// The active backend or hardware lacks a required feature.
    Unsupported(String),
    /// Diagnostic reported by the driver or graphics API.
    Backend(String),
    /// A GPU allocation failed.
    OutOfMemory,
    /// The presentation surface was lost and could not be recreated.
    SurfaceLost(String),
    /// None of the requested backends could be initialized.
    NoBackendAvailable(Vec<(BackendKind, String)>),
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(msg) => f.write_str(msg),
            Self::Unsupported(msg) => f.write_str(msg),
            Self::Backend(msg) => write!(f, "Graphics backend error: {}", msg),
            Self::OutOfMemory => write!(f, "Out of graphics memory"),
            Self::SurfaceLost(msg) => write!(f, "Surface lost: {}", msg),
            Self::NoBackendAvailable(attempts) => {
                write!(f, "Could not initialize any graphics backend")?;
                for (kind, reason) in attempts {
                    write!(f, "\n  {}: {}", kind, reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GraphicsError {}

impl GraphicsError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// True for errors that should abort the whole frame rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory | Self::SurfaceLost(_) | Self::NoBackendAvailable(_))
    }
}

pub type GraphicsResult<T> = Result<T, GraphicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_message_is_verbatim() {
        let err = GraphicsError::usage("Invalid mipmap level 3.");
        assert_eq!(err.to_string(), "Invalid mipmap level 3.");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_no_backend_lists_attempts() {
        let err = GraphicsError::NoBackendAvailable(vec![
            (BackendKind::OpenGl, "no GL context".into()),
            (BackendKind::Wgpu, "no adapter".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("opengl: no GL context"));
        assert!(msg.contains("wgpu: no adapter"));
        assert!(err.is_fatal());
    }
}
