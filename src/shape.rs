/*!
Collision shape cache.

Deduplicates simulation collision shapes by geometric identity so that N
instances of the same geometry share one cooked shape. Identity is the
[`ShapeDef`] descriptor: primitive dimensions, or source-setup id + hull index
+ scale for convex pieces, or vertex-set id for triangle meshes. Two
descriptors that compare equal always map to the same `SharedShape` instance
(pointer-level sharing via the shape's internal `Arc`).

Primitive leaves are cheap and carry no sub-shape ownership, so they live for
the whole world lifetime and are only dropped on [`ShapeCache::clear`].
Compound shapes built for dynamic bodies are cached per `(class identity,
mass)` together with precomputed mass properties, mirroring how the host asset
pipeline reuses one collision setup across every instance of an actor class.

Lookup keys are bit-exact: descriptors built from the same source data hash
identically, descriptors that differ in any dimension get their own entry.
*/

use std::collections::HashMap;

use nalgebra::Point3;
use rapier3d::prelude::*;

use crate::constants::METERS_PER_HOST_UNIT;
use crate::error::{BridgeError, BridgeResult};
use crate::geometry::{
    BodySetup, GeometryDesc, PrimitiveShape, SubShape, TriangleSoup, extract_geometry,
};
use crate::space::to_sim_local;
use crate::types::{Transform, Vec3};

/// Structural identity of a reusable collision shape. Dimensions are host
/// units; the cache converts to simulation meters when cooking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeDef {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, half_height: f32 },
    ConvexHull {
        setup_id: u64,
        hull_index: u32,
        scale: Vec3,
    },
    TriangleMesh { vertex_set_id: u64 },
}

impl ShapeDef {
    /// Descriptor of one extracted sub-shape.
    pub fn of(sub: &SubShape<'_>) -> ShapeDef {
        match *sub {
            SubShape::Primitive(p) => match *p {
                PrimitiveShape::Box { half_extents } => ShapeDef::Box { half_extents },
                PrimitiveShape::Sphere { radius } => ShapeDef::Sphere { radius },
                PrimitiveShape::Capsule {
                    radius,
                    half_height,
                } => ShapeDef::Capsule {
                    radius,
                    half_height,
                },
            },
            SubShape::ConvexPiece {
                setup,
                hull_index,
                scale,
            } => ShapeDef::ConvexHull {
                setup_id: setup.id,
                hull_index: hull_index as u32,
                scale,
            },
        }
    }

    /// Bit-exact hashable key. Floats go through `to_bits` so equality is
    /// structural, not tolerance-based.
    fn key(&self) -> ShapeKey {
        fn bits3(v: Vec3) -> [u32; 3] {
            [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
        }
        match *self {
            ShapeDef::Box { half_extents } => ShapeKey::Box(bits3(half_extents)),
            ShapeDef::Sphere { radius } => ShapeKey::Sphere(radius.to_bits()),
            ShapeDef::Capsule {
                radius,
                half_height,
            } => ShapeKey::Capsule(radius.to_bits(), half_height.to_bits()),
            ShapeDef::ConvexHull {
                setup_id,
                hull_index,
                scale,
            } => ShapeKey::ConvexHull(setup_id, hull_index, bits3(scale)),
            ShapeDef::TriangleMesh { vertex_set_id } => ShapeKey::TriangleMesh(vertex_set_id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ShapeKey {
    Box([u32; 3]),
    Sphere(u32),
    Capsule(u32, u32),
    ConvexHull(u64, u32, [u32; 3]),
    TriangleMesh(u64),
}

/// Cooked shape + precomputed mass data for one `(class identity, mass)` pair.
#[derive(Clone)]
pub struct DynamicShapeData {
    pub shape: SharedShape,
    /// True when the shape owns sub-shapes (multi-piece geometry). A single
    /// leaf at identity offset is stored directly without a compound wrapper.
    pub is_compound: bool,
    pub mass: f32,
    /// Mass, local center of mass and inertia for `mass`, scaled from the
    /// shape's unit-density mass properties.
    pub mass_properties: MassProperties,
}

/// World-scoped shape cache. Created with the owning world and torn down with
/// it; never process-wide, so independent worlds cannot interfere.
#[derive(Default)]
pub struct ShapeCache {
    shapes: HashMap<ShapeKey, SharedShape>,
    dynamic: HashMap<(u64, u32), DynamicShapeData>,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct cached leaf/mesh shapes. Used by tests to assert
    /// the cache does not grow on repeated identical requests.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.dynamic.is_empty()
    }

    /// Drop every cached shape. Only valid at world teardown/reset, when no
    /// live body references cache entries any more.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.dynamic.clear();
    }

    pub fn get_box(&mut self, half_extents: Vec3) -> BridgeResult<SharedShape> {
        if half_extents.x <= 0.0 || half_extents.y <= 0.0 || half_extents.z <= 0.0 {
            return Err(BridgeError::DegenerateGeometry("box with zero half-extent"));
        }
        let key = ShapeDef::Box { half_extents }.key();
        let shape = self.shapes.entry(key).or_insert_with(|| {
            let he = half_extents * METERS_PER_HOST_UNIT;
            SharedShape::cuboid(he.x, he.y, he.z)
        });
        Ok(shape.clone())
    }

    pub fn get_sphere(&mut self, radius: f32) -> BridgeResult<SharedShape> {
        if radius <= 0.0 {
            return Err(BridgeError::DegenerateGeometry("sphere with zero radius"));
        }
        let key = ShapeDef::Sphere { radius }.key();
        let shape = self
            .shapes
            .entry(key)
            .or_insert_with(|| SharedShape::ball(radius * METERS_PER_HOST_UNIT));
        Ok(shape.clone())
    }

    pub fn get_capsule(&mut self, radius: f32, half_height: f32) -> BridgeResult<SharedShape> {
        if radius <= 0.0 || half_height < 0.0 {
            return Err(BridgeError::DegenerateGeometry("capsule with zero radius"));
        }
        let key = ShapeDef::Capsule {
            radius,
            half_height,
        }
        .key();
        let shape = self.shapes.entry(key).or_insert_with(|| {
            let hh = half_height * METERS_PER_HOST_UNIT;
            SharedShape::capsule(
                Point3::new(0.0, -hh, 0.0),
                Point3::new(0.0, hh, 0.0),
                radius * METERS_PER_HOST_UNIT,
            )
        });
        Ok(shape.clone())
    }

    /// Cook (or reuse) one convex-hull piece of a baked body setup, scaled by
    /// the owning component's scale.
    pub fn get_convex_hull(
        &mut self,
        setup: &BodySetup,
        hull_index: usize,
        scale: Vec3,
    ) -> BridgeResult<SharedShape> {
        let key = ShapeDef::ConvexHull {
            setup_id: setup.id,
            hull_index: hull_index as u32,
            scale,
        }
        .key();
        if let Some(shape) = self.shapes.get(&key) {
            return Ok(shape.clone());
        }

        let piece = setup
            .hulls
            .get(hull_index)
            .ok_or(BridgeError::DegenerateGeometry("hull index out of range"))?;
        let points: Vec<Point3<f32>> = piece
            .vertices
            .iter()
            .map(|v| Point3::from(v.component_mul(&scale) * METERS_PER_HOST_UNIT))
            .collect();
        let shape = SharedShape::convex_hull(&points)
            .ok_or(BridgeError::DegenerateGeometry("convex hull cook failed"))?;

        self.shapes.insert(key, shape.clone());
        Ok(shape)
    }

    /// Cook (or reuse) a triangle mesh from quad soup. Each quad becomes two
    /// triangles over the flattened vertex array.
    pub fn get_triangle_mesh(&mut self, soup: &TriangleSoup) -> BridgeResult<SharedShape> {
        let key = ShapeDef::TriangleMesh {
            vertex_set_id: soup.vertex_set_id,
        }
        .key();
        if let Some(shape) = self.shapes.get(&key) {
            return Ok(shape.clone());
        }

        let quads = soup.quad_count();
        if quads == 0 {
            return Err(BridgeError::DegenerateGeometry("empty triangle soup"));
        }

        let mut vertices = Vec::with_capacity(quads * 4);
        let mut indices = Vec::with_capacity(quads * 2);
        for i in 0..quads {
            let base = (vertices.len()) as u32;
            vertices.push(Point3::from(soup.a[i] * METERS_PER_HOST_UNIT));
            vertices.push(Point3::from(soup.b[i] * METERS_PER_HOST_UNIT));
            vertices.push(Point3::from(soup.c[i] * METERS_PER_HOST_UNIT));
            vertices.push(Point3::from(soup.d[i] * METERS_PER_HOST_UNIT));
            indices.push([base, base + 1, base + 2]);
            indices.push([base, base + 2, base + 3]);
        }

        let shape = SharedShape::trimesh(vertices, indices)
            .map_err(|_| BridgeError::DegenerateGeometry("triangle mesh cook failed"))?;
        self.shapes.insert(key, shape.clone());
        Ok(shape)
    }

    /// Descriptor-keyed dispatch for extraction consumers.
    pub fn resolve(&mut self, sub: &SubShape<'_>) -> BridgeResult<SharedShape> {
        match *sub {
            SubShape::Primitive(p) => match *p {
                PrimitiveShape::Box { half_extents } => self.get_box(half_extents),
                PrimitiveShape::Sphere { radius } => self.get_sphere(radius),
                PrimitiveShape::Capsule {
                    radius,
                    half_height,
                } => self.get_capsule(radius, half_height),
            },
            SubShape::ConvexPiece {
                setup,
                hull_index,
                scale,
            } => self.get_convex_hull(setup, hull_index, scale),
        }
    }

    /// Shape + mass properties for a dynamic body of class `class_id` with
    /// the given geometry and mass. Cached per `(class_id, mass)`: every
    /// instance of the same actor class with the same mass shares one cooked
    /// shape and one inertia computation.
    pub fn dynamic_shape(
        &mut self,
        class_id: u64,
        geometry: &GeometryDesc,
        mass: f32,
    ) -> BridgeResult<DynamicShapeData> {
        if mass <= 0.0 {
            return Err(BridgeError::InvalidMass(mass));
        }

        let cache_key = (class_id, mass.to_bits());
        if let Some(data) = self.dynamic.get(&cache_key) {
            return Ok(data.clone());
        }

        let mut parts: Vec<(nalgebra::Isometry3<f32>, SharedShape)> = Vec::new();
        let mut first_err: Option<BridgeError> = None;
        extract_geometry(geometry, &Transform::identity(), &mut |sub, xform| {
            if first_err.is_some() {
                return;
            }
            match self.resolve(&sub) {
                Ok(shape) => parts.push((to_sim_local(xform), shape)),
                Err(e) => first_err = Some(e),
            }
        });
        if let Some(e) = first_err {
            return Err(e);
        }
        if parts.is_empty() {
            return Err(BridgeError::DegenerateGeometry("no collision geometry"));
        }

        let single_leaf = parts.len() == 1 && parts[0].0 == nalgebra::Isometry3::identity();
        let (shape, is_compound) = if single_leaf {
            let (_, shape) = parts.remove(0);
            (shape, false)
        } else {
            (SharedShape::compound(parts), true)
        };

        let unit = shape.mass_properties(1.0);
        let unit_mass = unit.mass();
        if unit_mass <= 0.0 {
            return Err(BridgeError::DegenerateGeometry("shape has no volume"));
        }
        let ratio = mass / unit_mass;
        let mass_properties = MassProperties::with_principal_inertia_frame(
            unit.local_com,
            mass,
            unit.principal_inertia() * ratio,
            unit.principal_inertia_local_frame,
        );

        let data = DynamicShapeData {
            shape,
            is_compound,
            mass,
            mass_properties,
        };
        self.dynamic.insert(cache_key, data.clone());
        Ok(data)
    }
}

/// Pointer identity of two cached shapes (same underlying cooked shape).
///
/// This is the observable form of the cache's reuse guarantee: callers (and
/// this crate's tests) can verify that two geometry inputs with equal
/// descriptors resolved to one shared cooked shape rather than two separate
/// cooks. `SharedShape` itself does not expose its sharing, so the check goes
/// through the address of the inner shape.
pub fn same_shape(a: &SharedShape, b: &SharedShape) -> bool {
    let pa: &dyn Shape = &**a;
    let pb: &dyn Shape = &**b;
    std::ptr::eq(pa as *const _ as *const u8, pb as *const _ as *const u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::test_support::{mesh_desc, three_hull_setup};
    use approx::assert_relative_eq;

    #[test]
    fn identical_descriptors_share_one_shape_and_cache_does_not_grow() {
        let mut cache = ShapeCache::new();

        let a = cache.get_box(Vec3::new(50.0, 50.0, 50.0)).unwrap();
        let len_after_first = cache.len();
        let b = cache.get_box(Vec3::new(50.0, 50.0, 50.0)).unwrap();

        assert!(same_shape(&a, &b));
        assert_eq!(cache.len(), len_after_first);

        // A different dimension is a different descriptor.
        let c = cache.get_box(Vec3::new(50.0, 50.0, 60.0)).unwrap();
        assert!(!same_shape(&a, &c));
        assert_eq!(cache.len(), len_after_first + 1);
    }

    #[test]
    fn hull_pieces_are_keyed_by_setup_index_and_scale() {
        let mut cache = ShapeCache::new();
        let setup = three_hull_setup(11);

        let s0 = cache
            .get_convex_hull(&setup, 0, Vec3::new(1.0, 1.0, 1.0))
            .unwrap();
        let s0_again = cache
            .get_convex_hull(&setup, 0, Vec3::new(1.0, 1.0, 1.0))
            .unwrap();
        let s1 = cache
            .get_convex_hull(&setup, 1, Vec3::new(1.0, 1.0, 1.0))
            .unwrap();
        let s0_scaled = cache
            .get_convex_hull(&setup, 0, Vec3::new(2.0, 2.0, 2.0))
            .unwrap();

        assert!(same_shape(&s0, &s0_again));
        assert!(!same_shape(&s0, &s1));
        assert!(!same_shape(&s0, &s0_scaled));
    }

    #[test]
    fn degenerate_inputs_are_rejected_without_caching() {
        let mut cache = ShapeCache::new();

        assert!(matches!(
            cache.get_box(Vec3::new(0.0, 10.0, 10.0)),
            Err(BridgeError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            cache.get_sphere(0.0),
            Err(BridgeError::DegenerateGeometry(_))
        ));
        let empty = TriangleSoup {
            vertex_set_id: 3,
            a: vec![],
            b: vec![],
            c: vec![],
            d: vec![],
        };
        assert!(matches!(
            cache.get_triangle_mesh(&empty),
            Err(BridgeError::DegenerateGeometry(_))
        ));

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn dynamic_shape_is_cached_per_class_and_mass() {
        let mut cache = ShapeCache::new();
        let desc = mesh_desc(three_hull_setup(21));

        let first = cache.dynamic_shape(42, &desc, 5.0).unwrap();
        let second = cache.dynamic_shape(42, &desc, 5.0).unwrap();
        assert!(same_shape(&first.shape, &second.shape));
        assert!(first.is_compound);
        assert_relative_eq!(first.mass_properties.mass(), 5.0, epsilon = 1.0e-5);

        // Same class, different mass: shape pieces reused, new mass data.
        let heavier = cache.dynamic_shape(42, &desc, 10.0).unwrap();
        assert_relative_eq!(heavier.mass_properties.mass(), 10.0, epsilon = 1.0e-5);
    }

    #[test]
    fn dynamic_shape_rejects_non_positive_mass() {
        let mut cache = ShapeCache::new();
        let desc = mesh_desc(three_hull_setup(5));

        assert!(matches!(
            cache.dynamic_shape(1, &desc, 0.0),
            Err(BridgeError::InvalidMass(_))
        ));
        assert!(matches!(
            cache.dynamic_shape(1, &desc, -1.0),
            Err(BridgeError::InvalidMass(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn triangle_mesh_reuses_by_vertex_set_id() {
        let mut cache = ShapeCache::new();
        let v = |x: f32, z: f32| Vec3::new(x, 0.0, z);
        let soup = TriangleSoup {
            vertex_set_id: 77,
            a: vec![v(0.0, 0.0)],
            b: vec![v(100.0, 0.0)],
            c: vec![v(100.0, 100.0)],
            d: vec![v(0.0, 100.0)],
        };

        let first = cache.get_triangle_mesh(&soup).unwrap();
        let second = cache.get_triangle_mesh(&soup).unwrap();
        assert!(same_shape(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
