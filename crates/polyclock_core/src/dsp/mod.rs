use std::collections::HashMap;

use crate::types::{ModuleSchema, SampleableConstructor};

pub mod clock;
pub mod routing;
pub mod utilities;
pub mod utils;

pub fn get_constructors() -> HashMap<String, SampleableConstructor> {
    let mut map = HashMap::new();
    clock::install_constructors(&mut map);
    routing::install_constructors(&mut map);
    map
}

pub fn schemas() -> Vec<ModuleSchema> {
    [clock::schemas(), routing::schemas()].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_constructor_has_a_schema() {
        let constructors = get_constructors();
        let schemas = schemas();
        assert_eq!(constructors.len(), schemas.len());
        for schema in &schemas {
            assert!(
                constructors.contains_key(&schema.name),
                "no constructor for {}",
                schema.name
            );
        }
    }
}
