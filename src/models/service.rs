use serde::Serialize;

/// A bookable offering. The catalog is compiled in, so every field is static.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Service {
    pub id: i64,
    pub title: &'static str,
    pub description: &'static str,
    pub price: &'static str,
    pub duration: &'static str,
    pub icon: &'static str,
}
