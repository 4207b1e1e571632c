//! `opcall` Core — parameter model, parameter descriptors, execution results,
//! and the wire constants shared by the client and the server.

pub mod params;
pub mod protocol;
pub mod result;
pub mod schema;

pub use params::{Parameter, Params};
pub use protocol::StatusClass;
pub use result::{
    DispatchResult, DispatchStatus, ExecutionResult, ExecutionStatus, OperationValue,
};
pub use schema::{validate_params, validate_text, NumericKind, ParamDescriptor, ValidationResult};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
