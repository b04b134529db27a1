use std::fmt;

/// Shader technique a part is drawn with. Every technique consumes the
/// same instance stream layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    /// Opaque geometry, one pass.
    HardwareInstancing,
    /// Back faces first, then front faces.
    AlphaBlended,
    /// Depth-only pass into the shadow map.
    ShadowMap,
}

impl Technique {
    pub fn for_model(alpha_blended: bool) -> Self {
        if alpha_blended {
            Technique::AlphaBlended
        } else {
            Technique::HardwareInstancing
        }
    }

    pub fn pass_count(self) -> u32 {
        match self {
            Technique::AlphaBlended => 2,
            Technique::HardwareInstancing | Technique::ShadowMap => 1,
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Technique::HardwareInstancing => "instanced",
            Technique::AlphaBlended => "alpha",
            Technique::ShadowMap => "shadow",
        };
        f.write_str(name)
    }
}
