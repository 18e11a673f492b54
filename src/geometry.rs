/*!
Host renderable geometry description and the geometry extractor.

The extractor decomposes an actor's geometry into a flat, ordered sequence of
sub-shapes delivered through a callback, without building an intermediate
tree. Each callback invocation receives a borrowed sub-shape view plus the
accumulated host-space transform relative to the actor root.

Traversal is depth-first over the component hierarchy and emission order within
one renderable is the source array order, so two extractions of the same
geometry always emit identical sequences. Compound sub-shape indices derived
from this order are referenced by the shape cache, which is why the walk must
stay deterministic.
*/

use std::sync::Arc;

use crate::types::{Transform, Vec3};

/// Primitive collision shapes a host shape component can carry.
/// Dimensions are host units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PrimitiveShape {
    /// Axis-aligned box in component space, given by half-extents.
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Y-aligned capsule; `half_height` is half the cylinder section.
    Capsule { radius: f32, half_height: f32 },
}

/// A convex-hull decomposition piece baked into a source asset.
/// Vertices are host units, in setup-local space.
#[derive(Clone, Debug)]
pub struct ConvexPiece {
    pub vertices: Vec<Vec3>,
}

/// Baked collision setup of a mesh asset: an ordered list of convex pieces.
///
/// `id` must be stable for the asset's lifetime; it keys shape-cache entries
/// together with the piece index and scale, so two mesh components referencing
/// the same setup share cooked hulls.
#[derive(Clone, Debug)]
pub struct BodySetup {
    pub id: u64,
    pub hulls: Vec<ConvexPiece>,
}

/// A mesh component: a shared body setup plus the component's scale.
#[derive(Clone, Debug)]
pub struct MeshShape {
    pub setup: Arc<BodySetup>,
    pub scale: Vec3,
}

/// What one geometry component contributes to collision.
#[derive(Clone, Debug)]
pub enum ComponentShape {
    Primitive(PrimitiveShape),
    Mesh(MeshShape),
}

/// One node of a host renderable's component hierarchy.
#[derive(Clone, Debug)]
pub struct GeometryComponent {
    pub shape: ComponentShape,
    /// Transform relative to the parent component (actor root for top level).
    pub local: Transform,
    pub children: Vec<GeometryComponent>,
}

impl GeometryComponent {
    pub fn new(shape: ComponentShape, local: Transform) -> Self {
        Self {
            shape,
            local,
            children: Vec::new(),
        }
    }
}

/// An actor's full renderable geometry description.
#[derive(Clone, Debug, Default)]
pub struct GeometryDesc {
    pub components: Vec<GeometryComponent>,
}

/// Raw triangle-soup input for procedurally generated bodies: four parallel
/// vertex arrays where `(a[i], b[i], c[i], d[i])` forms one quad.
///
/// `vertex_set_id` must be unique per distinct vertex set; it is the cache
/// identity of the cooked triangle mesh.
#[derive(Clone, Debug)]
pub struct TriangleSoup {
    pub vertex_set_id: u64,
    pub a: Vec<Vec3>,
    pub b: Vec<Vec3>,
    pub c: Vec<Vec3>,
    pub d: Vec<Vec3>,
}

impl TriangleSoup {
    /// Number of quads described by the parallel arrays (the shortest array
    /// bounds the count, mismatched tails are ignored).
    pub fn quad_count(&self) -> usize {
        self.a
            .len()
            .min(self.b.len())
            .min(self.c.len())
            .min(self.d.len())
    }
}

/// Borrowed view of one extracted sub-shape.
#[derive(Clone, Copy, Debug)]
pub enum SubShape<'a> {
    Primitive(&'a PrimitiveShape),
    ConvexPiece {
        setup: &'a BodySetup,
        hull_index: usize,
        scale: Vec3,
    },
}

/// Walk `desc` depth-first and invoke `callback` once per leaf sub-shape with
/// the accumulated host-space transform (relative to `transform_so_far`).
///
/// Single pass, finite, not restartable: each call re-walks the source
/// geometry. A mesh component emits one entry per baked convex piece, in
/// source order; a primitive component emits exactly one entry.
pub fn extract_geometry<F>(desc: &GeometryDesc, transform_so_far: &Transform, callback: &mut F)
where
    F: FnMut(SubShape<'_>, &Transform),
{
    for component in &desc.components {
        extract_component(component, transform_so_far, callback);
    }
}

fn extract_component<F>(component: &GeometryComponent, parent: &Transform, callback: &mut F)
where
    F: FnMut(SubShape<'_>, &Transform),
{
    let accumulated = parent.compose(&component.local);

    match &component.shape {
        ComponentShape::Primitive(primitive) => {
            callback(SubShape::Primitive(primitive), &accumulated);
        }
        ComponentShape::Mesh(mesh) => {
            for hull_index in 0..mesh.setup.hulls.len() {
                callback(
                    SubShape::ConvexPiece {
                        setup: &mesh.setup,
                        hull_index,
                        scale: mesh.scale,
                    },
                    &accumulated,
                );
            }
        }
    }

    for child in &component.children {
        extract_component(child, &accumulated, callback);
    }
}
