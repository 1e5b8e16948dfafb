use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type the language model can be asked to produce.
///
/// The JSON schema is declared by hand next to each type rather than derived, so
/// the text sent to the model is exactly what we review here. `validate` runs after
/// deserialization and covers the rules a schema alone cannot enforce; a failure
/// sends the model another attempt with the message attached.
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Schema title, also used when describing the expected output to the model.
    const NAME: &'static str;

    fn json_schema() -> Value;

    fn validate(&mut self) -> Result<(), String> {
        Ok(())
    }
}
