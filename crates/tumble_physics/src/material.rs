//! Surface materials and the contact parameters resolved between them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle to a material registered with a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Surface material.
///
/// Negative coefficients mean "unset": the resolved [`ContactMaterial`]
/// decides. When both sides of a contact set a coefficient, the product of
/// the two wins over the contact material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Friction coefficient, or negative if unset
    pub friction: f64,
    /// Restitution, or negative if unset
    pub restitution: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            friction: -1.0,
            restitution: -1.0,
        }
    }
}

impl Material {
    /// Create a named material with unset coefficients
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Frictionless ice-like material
    pub fn ice() -> Self {
        Self::new("ice").with_friction(0.05).with_restitution(0.0)
    }

    /// Bouncy rubber-like material
    pub fn rubber() -> Self {
        Self::new("rubber").with_friction(0.8).with_restitution(0.8)
    }

    /// Wood material
    pub fn wood() -> Self {
        Self::new("wood").with_friction(0.5).with_restitution(0.3)
    }

    /// Set friction
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set restitution
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Product of both frictions if both are set
    pub fn combined_friction(&self, other: &Material) -> Option<f64> {
        (self.friction >= 0.0 && other.friction >= 0.0).then(|| self.friction * other.friction)
    }

    /// Product of both restitutions if both are set
    pub fn combined_restitution(&self, other: &Material) -> Option<f64> {
        (self.restitution >= 0.0 && other.restitution >= 0.0)
            .then(|| self.restitution * other.restitution)
    }
}

/// Coefficients and constraint tuning used for contacts between two materials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    pub friction: f64,
    pub restitution: f64,
    pub contact_equation_stiffness: f64,
    pub contact_equation_relaxation: f64,
    pub friction_equation_stiffness: f64,
    pub friction_equation_relaxation: f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
            contact_equation_stiffness: 1e7,
            contact_equation_relaxation: 3.0,
            friction_equation_stiffness: 1e7,
            friction_equation_relaxation: 3.0,
        }
    }
}

impl ContactParams {
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set stiffness and relaxation of the normal rows
    pub fn with_contact_equation(mut self, stiffness: f64, relaxation: f64) -> Self {
        self.contact_equation_stiffness = stiffness;
        self.contact_equation_relaxation = relaxation;
        self
    }

    /// Set stiffness and relaxation of the friction rows
    pub fn with_friction_equation(mut self, stiffness: f64, relaxation: f64) -> Self {
        self.friction_equation_stiffness = stiffness;
        self.friction_equation_relaxation = relaxation;
        self
    }
}

/// Contact parameters for an unordered pair of materials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactMaterial {
    pub material_a: MaterialId,
    pub material_b: MaterialId,
    pub params: ContactParams,
}

impl ContactMaterial {
    pub fn new(material_a: MaterialId, material_b: MaterialId, params: ContactParams) -> Self {
        Self { material_a, material_b, params }
    }

    #[inline]
    fn key(&self) -> (MaterialId, MaterialId) {
        pair_key(self.material_a, self.material_b)
    }
}

#[inline]
fn pair_key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Symmetric lookup of contact materials by material pair
#[derive(Debug, Clone, Default)]
pub struct ContactMaterialTable {
    entries: HashMap<(MaterialId, MaterialId), ContactMaterial>,
}

impl ContactMaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the pair. Returns the previous entry.
    pub fn insert(&mut self, contact_material: ContactMaterial) -> Option<ContactMaterial> {
        self.entries.insert(contact_material.key(), contact_material)
    }

    /// Look up the entry for `(a, b)` in either order
    pub fn get(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.entries.get(&pair_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_symmetric() {
        let mut table = ContactMaterialTable::new();
        let a = MaterialId(3);
        let b = MaterialId(1);
        table.insert(ContactMaterial::new(a, b, ContactParams::default().with_friction(0.9)));

        assert_eq!(table.get(a, b).map(|c| c.params.friction), Some(0.9));
        assert_eq!(table.get(b, a).map(|c| c.params.friction), Some(0.9));
        assert!(table.get(a, a).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_material_combine() {
        let rubber = Material::rubber();
        let ice = Material::ice();
        let unset = Material::new("plain");

        assert_eq!(rubber.combined_friction(&ice), Some(0.8 * 0.05));
        assert_eq!(rubber.combined_restitution(&ice), Some(0.0));
        assert_eq!(rubber.combined_friction(&unset), None);
    }

    #[test]
    fn test_contact_params_roundtrip_json() {
        let params = ContactParams::default().with_contact_equation(1e6, 4.0);
        let json = serde_json::to_string(&params).unwrap();
        let back: ContactParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
