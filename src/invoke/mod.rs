// Downstream invocation: route table -> envelope -> transport -> normalized result

pub mod envelope;
pub mod invoker;
pub mod routes;
pub mod transport;

pub use envelope::{
    AllSettledSpec, EnvelopeBuilder, InvocationEnvelope, InvocationOptions, InvocationSource,
    InvocationType, PreparedInvocation,
};
pub use invoker::{AllSettled, Invoker};
pub use routes::{RouteDescriptor, RouteError, RouteTable};
pub use transport::{FunctionTransport, HttpFunctionTransport, TransportError};
