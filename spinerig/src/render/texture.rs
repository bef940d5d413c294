use std::collections::HashMap;

/// Host-assigned handle of a texture page.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureId(pub u32);

/// Where an attachment's image lives on a texture page, in normalized page coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureRegion {
    pub texture: TextureId,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    /// Packed rotated by 90 degrees.
    pub rotated: bool,
}

impl TextureRegion {
    /// A region covering the whole page.
    pub fn full(texture: TextureId) -> Self {
        Self {
            texture,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            rotated: false,
        }
    }

    /// UVs for a region attachment quad, in BR, BL, UL, UR order.
    pub fn quad_uvs(&self) -> [[f32; 2]; 4] {
        let Self { u, v, u2, v2, .. } = *self;
        if self.rotated {
            [[u2, v], [u2, v2], [u, v2], [u, v]]
        } else {
            [[u2, v2], [u, v2], [u, v], [u2, v]]
        }
    }

    /// Maps a mesh UV given relative to the region into page space.
    pub fn map_uv(&self, uv: [f32; 2]) -> [f32; 2] {
        let width = self.u2 - self.u;
        let height = self.v2 - self.v;
        if self.rotated {
            [self.u + uv[1] * width, self.v + (1.0 - uv[0]) * height]
        } else {
            [self.u + uv[0] * width, self.v + uv[1] * height]
        }
    }
}

/// Resolves attachment paths to texture regions.
pub trait TextureLookup {
    fn region(&self, path: &str) -> Option<TextureRegion>;
}

impl TextureLookup for HashMap<String, TextureRegion> {
    fn region(&self, path: &str) -> Option<TextureRegion> {
        self.get(path).copied()
    }
}

impl<T: TextureLookup + ?Sized> TextureLookup for &T {
    fn region(&self, path: &str) -> Option<TextureRegion> {
        (**self).region(path)
    }
}
