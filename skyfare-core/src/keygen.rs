use uuid::Uuid;

/// Produces globally unique identifiers for new records. Leaf dependency of
/// every write path.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyGenerator;

impl KeyGenerator {
    pub fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
