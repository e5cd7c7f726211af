use crate::error::MomiError;

pub(crate) trait Validate {
    fn validate<F: FnOnce(String) -> MomiError>(&self, err: F) -> Result<(), MomiError>;
}
