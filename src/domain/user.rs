#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}
