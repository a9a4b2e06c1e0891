use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    /// Editor payload; an empty project when omitted.
    #[serde(default)]
    pub code: String,
}
