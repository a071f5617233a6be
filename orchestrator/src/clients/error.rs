use std::error::Error;
use std::fmt::{Display, Formatter};

/// The result type returned by [`InfrastructureClient`], [`ClusterClient`] and [`Workstation`]
/// implementations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by [`InfrastructureClient`], [`ClusterClient`] and [`Workstation`]
/// implementations.
#[derive(Debug)]
pub enum ClientError {
    /// The client could not be created.
    InitializationFailed(Option<BoxedError>),

    /// The resource that the operation targets does not exist.
    NotFound(Option<ErrorMessage>),

    /// Some data that was expected to be present in a response was missing.
    MissingData(Option<ErrorMessage>),

    /// The caller supplied something the provider cannot work with.
    InvalidInput(Option<ErrorMessage>),

    /// A call to the provider or the cluster failed.
    RequestFailed(Option<BoxedError>),

    /// A local file or process could not be used.
    Io(Option<BoxedError>),

    /// An error occurred serializing or deserializing.
    Serialization(Option<BoxedError>),
}

impl ClientError {
    pub fn not_found<S: Into<ErrorMessage>>(message: S) -> Self {
        Self::NotFound(Some(message.into()))
    }

    pub fn missing_data<S: Into<ErrorMessage>>(message: S) -> Self {
        Self::MissingData(Some(message.into()))
    }

    pub fn invalid_input<S: Into<ErrorMessage>>(message: S) -> Self {
        Self::InvalidInput(Some(message.into()))
    }

    pub fn request_failed<E: Into<BoxedError>>(source: E) -> Self {
        Self::RequestFailed(Some(source.into()))
    }

    pub fn io<E: Into<BoxedError>>(source: E) -> Self {
        Self::Io(Some(source.into()))
    }

    pub fn serialization<E: Into<BoxedError>>(source: E) -> Self {
        Self::Serialization(Some(source.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl ErrorEnum for ClientError {
    fn variant_name(&self) -> &'static str {
        match self {
            ClientError::InitializationFailed(_) => "Initialization failed",
            ClientError::NotFound(_) => "Not found",
            ClientError::MissingData(_) => "Missing data",
            ClientError::InvalidInput(_) => "Invalid input",
            ClientError::RequestFailed(_) => "Request failed",
            ClientError::Io(_) => "I/O error",
            ClientError::Serialization(_) => "Serialization error",
        }
    }

    fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ClientError::NotFound(s) | ClientError::MissingData(s) | ClientError::InvalidInput(s) => s
                .as_ref()
                .map(|some| some as &(dyn std::error::Error + Send + Sync + 'static)),
            ClientError::InitializationFailed(e)
            | ClientError::RequestFailed(e)
            | ClientError::Io(e)
            | ClientError::Serialization(e) => e.as_ref().map(|some| some.as_ref()),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner_as_source()
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// This struct can serve as an `Error` type when you want to provide an error message, but have no
/// underlying error type. It allows a string to serve as an error. This can be useful for mock
/// implementations of the clients.
///
/// # Example
///
/// ```
/// # use eksflow_orchestrator::clients::ErrorMessage;
/// // Create a std::error::Error from a string.
/// let _error: ErrorMessage = "Something bad happened".into();
/// ```
///
#[derive(Debug)]
pub struct ErrorMessage {
    message: String,
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.message, f)
    }
}

impl<S: Into<String>> From<S> for ErrorMessage {
    fn from(s: S) -> Self {
        Self { message: s.into() }
    }
}

impl std::error::Error for ErrorMessage {}

/// De-duplicates the `Display` and `Error` implementations of error enums that wrap an optional
/// inner error.
pub(crate) trait ErrorEnum {
    fn variant_name(&self) -> &'static str;
    fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)>;

    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.inner() {
            None => Display::fmt(self.variant_name(), f),
            Some(inner) => write!(f, "{}: {}", self.variant_name(), inner),
        }
    }

    fn inner_as_source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner().map(|some| some as &(dyn Error + 'static))
    }
}

#[test]
fn client_error_display() {
    assert_eq!(
        ClientError::not_found("stack 'EKS-dev-VPC' does not exist").to_string(),
        "Not found: stack 'EKS-dev-VPC' does not exist"
    );
    assert_eq!(ClientError::RequestFailed(None).to_string(), "Request failed");
    assert!(ClientError::not_found("x").is_not_found());
    assert!(!ClientError::request_failed(ErrorMessage::from("x")).is_not_found());
}
