use std::fmt;

macro_rules! anyhow {
    (@$kind:ident $fmt:literal $($args:tt)*) => {
        $crate::Error::new($crate::ErrorKind::$kind, Some(anyhow::anyhow!($fmt $($args)*)))
    };
    (@$kind:ident) => {
        $crate::Error::new($crate::ErrorKind::$kind, None)
    };
}
pub(crate) use anyhow;

macro_rules! bail {
    ($($t:tt)*) => {
        return Err($crate::anyhow!($($t)*))
    };
}
pub(crate) use bail;

/// The stable error taxonomy of the cipher facade.
///
/// Back-end-native error codes do not live here; they are recorded on the
/// session (see [`Session::last_errno`](crate::Session::last_errno)).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The session has not been initialized (or was already closed).
    NotInited,
    /// `init` was called on an initialized session.
    AlreadyInited,
    InvalidParam,
    /// The name is unknown, or no compiled-in back-end resolves it.
    CipherNotSupport,
    /// The requested direction was not enabled at `init` time.
    CipherDisabled,
    CipherOperation,
    CipherOperationSetIv,
    Malloc,
    /// The non-AEAD API was called on an AEAD cipher.
    MustCallAeadApi,
    /// The AEAD API was called on a non-AEAD cipher.
    MustNotCallAeadApi,
    SodiumOperation,
    SodiumOperationTagLen,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<anyhow::Error>,
    code: i64,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    pub fn new(kind: ErrorKind, source: Option<anyhow::Error>) -> Self {
        Self {
            kind,
            source,
            code: 0,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attaches the back-end-native error code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The back-end-native error code, or 0 when the error did not
    /// originate in a back-end.
    pub fn code(&self) -> i64 {
        self.code
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
