use thiserror::Error;

/// A common error type returned by functions throughout the planner.
///
/// Every variant carries a fully formatted message that names the file and line where the
/// error was raised, so errors can be bubbled up with `?` without losing their origin.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PlannerError {
    #[error("{0}")]
    GenericError(String),
    #[error("{0}")]
    IdxOutOfBoundError(String),
    #[error("{0}")]
    UnsupportedOperationError(String),
    #[error("{0}")]
    KinematicFailure(String),
    #[error("{0}")]
    MalformedSeed(String),
    #[error("{0}")]
    InvalidConfiguration(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    ThreadPoolError(String)
}
impl PlannerError {
    pub fn new_generic_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} -- File: {}, Line: {}", s, file, line);
        return Self::GenericError(s);
    }
    pub fn new_idx_out_of_bound_error(given_idx: usize, length_of_array: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Index {:?} is too large for the array of length {:?} -- File: {}, Line: {}", given_idx, length_of_array, file, line);
        return Self::IdxOutOfBoundError(s);
    }
    pub fn new_check_for_idx_out_of_bound_error(given_idx: usize, length_of_array: usize, file: &str, line: u32) -> Result<(), Self> {
        return if given_idx >= length_of_array {
            Err(Self::new_idx_out_of_bound_error(given_idx, length_of_array, file, line))
        } else {
            Ok(())
        }
    }
    pub fn new_unsupported_operation_error(function_name: &str, message: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Unsupported operation error in function {}.  {} -- File: {}, Line: {}", function_name, message, file, line);
        return Self::UnsupportedOperationError(s);
    }
    pub fn new_kinematic_failure_error(message: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Kinematic failure.  {} -- File: {}, Line: {}", message, file, line);
        return Self::KinematicFailure(s);
    }
    pub fn new_malformed_seed_error(message: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Malformed trajectory seed.  {} -- File: {}, Line: {}", message, file, line);
        return Self::MalformedSeed(s);
    }
    pub fn new_invalid_configuration_error(field: &str, message: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Invalid value for parameter {}.  {} -- File: {}, Line: {}", field, message, file, line);
        return Self::InvalidConfiguration(s);
    }
    pub fn new_invalid_request_error(message: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Invalid planning request.  {} -- File: {}, Line: {}", message, file, line);
        return Self::InvalidRequest(s);
    }
    pub fn new_vec_wrong_size_error(function_name: &str, given_size: usize, correct_size: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Vector given to {} was of size {} instead of the correct size {} -- File: {}, Line: {}", function_name, given_size, correct_size, file, line);
        return Self::GenericError(s);
    }
    pub fn is_malformed_seed(&self) -> bool {
        return match self {
            PlannerError::MalformedSeed(_) => { true }
            _ => { false }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_check_passes_in_bounds() {
        assert!(PlannerError::new_check_for_idx_out_of_bound_error(2, 3, file!(), line!()).is_ok());
        let e = PlannerError::new_check_for_idx_out_of_bound_error(3, 3, file!(), line!()).unwrap_err();
        assert!(matches!(e, PlannerError::IdxOutOfBoundError(_)));
    }

    #[test]
    fn messages_name_their_origin() {
        let e = PlannerError::new_malformed_seed_error("no poses resolved", "a.rs", 12);
        assert!(e.is_malformed_seed());
        let s = e.to_string();
        assert!(s.contains("no poses resolved"));
        assert!(s.contains("File: a.rs, Line: 12"));
    }
}
