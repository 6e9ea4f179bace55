pub mod federation;
mod registry;

pub use federation::{
    register_federation_tools, CallToolTool, ListServersTool, ReportServerTool, SearchToolsTool,
    StatsTool,
};
pub use registry::{
    json_schema_array, json_schema_number, json_schema_object, json_schema_string, Tool,
    ToolRegistry,
};
