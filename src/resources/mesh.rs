use std::f32::consts::PI;

/// Flat vertex attribute arrays of a non-indexed triangle list.
///
/// `positions` and `normals` hold 3 floats per vertex, `tex_coords` 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub tex_coords: Vec<f32>,
    pub normals: Vec<f32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    fn push_vertex(&mut self, position: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) {
        self.positions.extend_from_slice(&position);
        self.tex_coords.extend_from_slice(&tex_coord);
        self.normals.extend_from_slice(&normal);
    }

    /// A sphere around the origin made of `stacks` rings of `slices` quads.
    ///
    /// Texture coordinates wrap once around the equator, v grows from the
    /// north pole downwards. Both counts are clamped to at least 3 slices and
    /// 2 stacks.
    pub fn uv_sphere(stacks: u32, slices: u32, radius: f32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);

        let grid = |stack: u32, slice: u32| -> ([f32; 3], [f32; 2], [f32; 3]) {
            let u = slice as f32 / slices as f32;
            let v = stack as f32 / stacks as f32;
            let theta = v * PI;
            let phi = u * 2.0 * PI;
            let normal = [theta.sin() * phi.cos(), theta.cos(), -theta.sin() * phi.sin()];
            let position = normal.map(|n| n * radius);
            (position, [u, v], normal)
        };

        let mut data = Self::default();
        for stack in 0..stacks {
            for slice in 0..slices {
                let top_left = grid(stack, slice);
                let top_right = grid(stack, slice + 1);
                let bottom_left = grid(stack + 1, slice);
                let bottom_right = grid(stack + 1, slice + 1);

                // The pole rows collapse one triangle of each quad to a point.
                if stack != 0 {
                    for (p, t, n) in [top_left, bottom_left, top_right] {
                        data.push_vertex(p, t, n);
                    }
                }
                if stack != stacks - 1 {
                    for (p, t, n) in [top_right, bottom_left, bottom_right] {
                        data.push_vertex(p, t, n);
                    }
                }
            }
        }
        data
    }

    /// A square in the xy plane facing +z, two triangles.
    pub fn quad(half_extent: f32) -> Self {
        let h = half_extent;
        let corners = [
            ([-h, -h, 0.0], [0.0, 1.0]),
            ([h, -h, 0.0], [1.0, 1.0]),
            ([h, h, 0.0], [1.0, 0.0]),
            ([-h, h, 0.0], [0.0, 0.0]),
        ];
        let mut data = Self::default();
        for index in [0, 1, 2, 0, 2, 3] {
            let (position, tex_coord) = corners[index];
            data.push_vertex(position, tex_coord, [0.0, 0.0, 1.0]);
        }
        data
    }
}
