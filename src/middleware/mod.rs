pub mod auth;
pub mod extract;
pub mod response;
pub mod workspace;

pub use auth::{authorize_middleware, AuthGuard, RequestContext};
pub use extract::JsonBody;
pub use response::{ApiResponse, ApiResult};
pub use workspace::{HeaderShapeValidator, WorkspacePolicy, WorkspaceValidator, WORKSPACE_HEADER};
