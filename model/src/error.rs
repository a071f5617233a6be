use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("Invalid CIDR block '{}': {}", input, reason))]
    CidrParse { input: String, reason: String },

    #[snafu(display(
        "Unable to split '{}' into {} blocks: the resulting prefix would exceed /32",
        cidr,
        count
    ))]
    CidrSplit { cidr: String, count: usize },

    #[snafu(display("Parse error: {}", source))]
    SerdePlain { source: serde_plain::Error },
}
