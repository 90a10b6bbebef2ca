pub type Result<T> = std::result::Result<T, Error>;

/// Failures internal to parsing helpers. By design none of these cross the
/// [`Describer::describe`](crate::Describer::describe) boundary: every caller
/// degrades to synthesized or generic text instead of propagating, because for
/// an accessibility caption "no caption" is strictly worse than "an imperfect
/// caption".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed directive ({directive}): {message}")]
    MalformedDirective { directive: String, message: String },
}
