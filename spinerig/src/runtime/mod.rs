mod attachment;
mod bone;
mod ik;
mod path_constraint;
mod physics;
mod skeleton;
mod transform_constraint;
mod update_cache;

pub use bone::Bone;
pub use ik::IkConstraint;
pub use path_constraint::PathConstraint;
pub use physics::{Physics, PhysicsConstraint};
pub use skeleton::{Skeleton, Slot};
pub use transform_constraint::TransformConstraint;
pub use update_cache::UpdateCacheItem;

pub(crate) use attachment::compute_world_vertices;

#[cfg(test)]
mod skeleton_tests;

#[cfg(test)]
mod update_cache_tests;



#[cfg(test)]
mod path_constraint_tests;
