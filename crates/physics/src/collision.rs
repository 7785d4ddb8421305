//! Collision groups and surface materials.

use rapier3d::prelude::*;

/// Collision groups for different body types.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionGroup {
    /// Static ground (terrain trimesh)
    Terrain = 1 << 0,
    /// Vehicle chassis hull and skid plate
    Chassis = 1 << 1,
}

impl CollisionGroup {
    /// Membership and filter for static terrain.
    pub fn terrain() -> (Group, Group) {
        let membership = Group::from_bits_retain(Self::Terrain as u32);
        let filter = Group::ALL;
        (membership, filter)
    }

    /// Membership and filter for a chassis. Chassis only touch the ground.
    pub fn chassis() -> (Group, Group) {
        let membership = Group::from_bits_retain(Self::Chassis as u32);
        let filter = Group::from_bits_retain(Self::Terrain as u32);
        (membership, filter)
    }

    pub fn interaction_groups(pair: (Group, Group)) -> InteractionGroups {
        InteractionGroups::new(pair.0, pair.1)
    }
}

/// Friction and restitution for a collider, with the rules used to combine them
/// with whatever the collider touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub friction: f32,
    pub restitution: f32,
    pub friction_combine: CoefficientCombineRule,
    pub restitution_combine: CoefficientCombineRule,
}

impl SurfaceMaterial {
    /// Grippy, dead ground. Its friction wins over the chassis and its
    /// restitution suppresses bounce.
    pub fn ground() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.0,
            friction_combine: CoefficientCombineRule::Max,
            restitution_combine: CoefficientCombineRule::Min,
        }
    }

    /// Slippery hull so a chassis scraping the ground slides instead of sticking.
    pub fn chassis() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.1,
            friction_combine: CoefficientCombineRule::Average,
            restitution_combine: CoefficientCombineRule::Average,
        }
    }

    pub(crate) fn apply(&self, builder: ColliderBuilder) -> ColliderBuilder {
        builder
            .friction(self.friction)
            .restitution(self.restitution)
            .friction_combine_rule(self.friction_combine)
            .restitution_combine_rule(self.restitution_combine)
    }
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self::chassis()
    }
}
