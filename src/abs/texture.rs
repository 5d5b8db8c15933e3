//! Structs and functions for handling textures.
//!
//! A [`TextureSet`] is an ordered list of [`Texture`]s. Entry `i` is sampled from texture unit
//! `i`, and is exposed to shaders under `"<kind><n>"` where `n` counts entries of the same kind
//! from 1 (`texture_diffuse1`, `texture_diffuse2`, `texture_normal1`, ...).

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use fxhash::FxHashSet;
use image::GenericImageView;

use crate::abs::{Bound, Gpu, ShaderProgram};
use crate::error::TextureError;

/// The order cubemap faces are uploaded in.
pub const CUBEMAP_FACES: [u32; 6] = [
    glow::TEXTURE_CUBE_MAP_POSITIVE_X,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
    glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
    glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
];

/// The role a texture plays in shading. Determines its sampler name and binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Reflection,
    Normal,
    Height,
    Cubemap,
}

impl TextureKind {
    pub const ALL: [TextureKind; 6] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Reflection,
        TextureKind::Normal,
        TextureKind::Height,
        TextureKind::Cubemap,
    ];

    /// The sampler name prefix shaders declare for this kind.
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Reflection => "texture_reflection",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
            TextureKind::Cubemap => "texture_cubemap",
        }
    }

    /// The binding target the texture lives on.
    pub fn target(self) -> u32 {
        match self {
            TextureKind::Cubemap => glow::TEXTURE_CUBE_MAP,
            _ => glow::TEXTURE_2D,
        }
    }

    /// Normal and height maps hold data, not color, and must not be sRGB decoded.
    fn is_linear(self) -> bool {
        matches!(self, TextureKind::Normal | TextureKind::Height)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for TextureKind {
    type Err = TextureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextureKind::ALL
            .into_iter()
            .find(|kind| kind.uniform_prefix() == s)
            .ok_or_else(|| TextureError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uniform_prefix())
    }
}

/// Raw pixels handed back by an [`ImageLoader`], tightly packed, 8 bits per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

/// Decodes image files. Any failure is reported as a message and becomes a
/// [`TextureError::Load`].
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<DecodedImage, String>;
}

/// Loads images from disk with the [`image`] crate.
#[derive(Debug, Clone, Copy)]
pub struct FsImageLoader {
    /// OpenGL expects the first row at the bottom.
    pub flip_vertically: bool,
}

impl Default for FsImageLoader {
    fn default() -> Self {
        Self {
            flip_vertically: true,
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, path: &Path) -> Result<DecodedImage, String> {
        let image = image::open(path).map_err(|e| e.to_string())?;
        let image = if self.flip_vertically {
            image.flipv()
        } else {
            image
        };
        let (width, height) = image.dimensions();
        let (channels, pixels) = match image.color().channel_count() {
            1 => (1, image.into_luma8().into_raw()),
            2 => (2, image.into_luma_alpha8().into_raw()),
            3 => (3, image.into_rgb8().into_raw()),
            _ => (4, image.into_rgba8().into_raw()),
        };
        Ok(DecodedImage {
            width,
            height,
            channels,
            pixels,
        })
    }
}

/// Pixel transfer format for a channel count.
fn pixel_format(channels: u8) -> Option<u32> {
    match channels {
        1 => Some(glow::RED),
        3 => Some(glow::RGB),
        4 => Some(glow::RGBA),
        _ => None,
    }
}

/// Checks that `image` holds exactly `width * height * channels` bytes and that its size fits
/// the GL integer range, returning the size to upload with.
fn upload_size(path: &Path, image: &DecodedImage) -> Result<(i32, i32), TextureError> {
    let load_error = |reason: String| TextureError::Load {
        path: path.to_path_buf(),
        reason,
    };
    let width = i32::try_from(image.width)
        .map_err(|_| load_error(format!("width {} is too large", image.width)))?;
    let height = i32::try_from(image.height)
        .map_err(|_| load_error(format!("height {} is too large", image.height)))?;
    let expected = (image.width as usize)
        .checked_mul(image.height as usize)
        .and_then(|n| n.checked_mul(usize::from(image.channels)))
        .ok_or_else(|| load_error(format!("{}x{} is too large", image.width, image.height)))?;
    if image.pixels.len() != expected {
        return Err(load_error(format!(
            "{} bytes of pixel data, expected {expected} for {}x{} with {} channels",
            image.pixels.len(),
            image.width,
            image.height,
            image.channels
        )));
    }
    Ok((width, height))
}

/// Owns one texture object on the GPU and deletes it on drop.
pub struct GpuTexture {
    gl: Rc<dyn Gpu>,
    id: glow::Texture,
    target: u32,
}

impl GpuTexture {
    /// Allocates a texture object for the given target.
    pub fn new(gl: &Rc<dyn Gpu>, target: u32) -> Result<Self, TextureError> {
        let id = gl.create_texture().map_err(TextureError::Create)?;
        Ok(Self {
            gl: Rc::clone(gl),
            id,
            target,
        })
    }

    pub fn id(&self) -> glow::Texture {
        self.id
    }

    /// Binds the texture to the specified texture unit.
    pub fn bind(&self, unit: u32) {
        self.gl.active_texture(glow::TEXTURE0 + unit);
        self.gl.bind_texture(self.target, Some(self.id));
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.gl.delete_texture(self.id);
    }
}

/// One logical entry of a [`TextureSet`].
///
/// Entries loaded from the same path share one [`GpuTexture`].
#[derive(Clone)]
pub struct Texture {
    handle: Rc<GpuTexture>,
    path: Option<PathBuf>,
    kind: TextureKind,
}

impl Texture {
    pub fn id(&self) -> glow::Texture {
        self.handle.id
    }

    /// The source path. Cubemaps have none.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }
}

/// An ordered collection of textures bound together for one draw.
pub struct TextureSet {
    gl: Rc<dyn Gpu>,
    entries: Vec<Texture>,
    max_units: usize,
}

impl TextureSet {
    /// Creates an empty set. The texture unit limit is read from the context once, here.
    pub fn new(gl: &Rc<dyn Gpu>) -> Self {
        let max_units = gl
            .get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS)
            .max(0) as usize;
        Self {
            gl: Rc::clone(gl),
            entries: Vec::new(),
            max_units,
        }
    }

    /// Loads a 2D image as a texture of the given kind and appends it.
    ///
    /// If this set already holds `path`, the new entry aliases the existing GPU texture and keeps
    /// its kind; nothing is decoded or uploaded.
    pub fn load_2d(
        &mut self,
        loader: &dyn ImageLoader,
        path: impl AsRef<Path>,
        kind: TextureKind,
    ) -> Result<(), TextureError> {
        let path = path.as_ref();
        if kind == TextureKind::Cubemap {
            return Err(TextureError::CubemapAs2d {
                path: path.to_path_buf(),
            });
        }

        if let Some(existing) = self.entries.iter().find(|t| t.path() == Some(path)) {
            log::debug!("reusing texture {} for {}", path.display(), existing.kind);
            let alias = existing.clone();
            self.entries.push(alias);
            return Ok(());
        }

        let image = loader.load(path).map_err(|reason| TextureError::Load {
            path: path.to_path_buf(),
            reason,
        })?;
        let format = pixel_format(image.channels).ok_or_else(|| TextureError::Channels {
            path: path.to_path_buf(),
            channels: image.channels,
        })?;
        let (width, height) = upload_size(path, &image)?;
        let internal_format = if kind.is_linear() {
            glow::RGBA8
        } else {
            glow::SRGB8_ALPHA8
        };

        let texture = GpuTexture::new(&self.gl, glow::TEXTURE_2D)?;
        {
            let gl = &*self.gl;
            let _bound = Bound::texture(gl, glow::TEXTURE_2D, texture.id);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            // SAFETY: `upload_size` checked the buffer holds `width * height` tightly packed
            // pixels of `format`, and the unpack alignment is 1.
            unsafe {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    internal_format as i32,
                    width,
                    height,
                    format,
                    glow::UNSIGNED_BYTE,
                    Some(image.pixels.as_slice()),
                );
            }
            gl.generate_mipmap(glow::TEXTURE_2D);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
        }

        log::info!(
            "loaded {} ({}x{}, {} channels) as {kind}",
            path.display(),
            image.width,
            image.height,
            image.channels
        );
        self.entries.push(Texture {
            handle: Rc::new(texture),
            path: Some(path.to_path_buf()),
            kind,
        });
        Ok(())
    }

    /// Loads six images as one cubemap, in +X, -X, +Y, -Y, +Z, -Z order, and appends it.
    ///
    /// Fails without appending anything if there are not exactly six faces or any face fails to
    /// decode. Cubemaps are never deduplicated.
    pub fn load_cubemap<P: AsRef<Path>>(
        &mut self,
        loader: &dyn ImageLoader,
        faces: &[P],
    ) -> Result<(), TextureError> {
        if faces.len() != CUBEMAP_FACES.len() {
            return Err(TextureError::CubemapFaces(faces.len()));
        }

        let texture = GpuTexture::new(&self.gl, glow::TEXTURE_CUBE_MAP)?;
        {
            let gl = &*self.gl;
            let _bound = Bound::texture(gl, glow::TEXTURE_CUBE_MAP, texture.id);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            for (face, path) in CUBEMAP_FACES.into_iter().zip(faces) {
                let path = path.as_ref();
                let image = loader.load(path).map_err(|reason| TextureError::Load {
                    path: path.to_path_buf(),
                    reason,
                })?;
                let (format, internal_format) = match image.channels {
                    3 => (glow::RGB, glow::SRGB8),
                    4 => (glow::RGBA, glow::SRGB8_ALPHA8),
                    channels => {
                        return Err(TextureError::Channels {
                            path: path.to_path_buf(),
                            channels,
                        });
                    }
                };
                let (width, height) = upload_size(path, &image)?;
                // SAFETY: as in `load_2d`, the face buffer was checked against its size.
                unsafe {
                    gl.tex_image_2d(
                        face,
                        0,
                        internal_format as i32,
                        width,
                        height,
                        format,
                        glow::UNSIGNED_BYTE,
                        Some(image.pixels.as_slice()),
                    );
                }
            }

            for (parameter, value) in [
                (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
                (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_R, glow::CLAMP_TO_EDGE),
            ] {
                gl.tex_parameter_i32(glow::TEXTURE_CUBE_MAP, parameter, value as i32);
            }
        }

        log::info!("loaded cubemap from {}", faces[0].as_ref().display());
        self.entries.push(Texture {
            handle: Rc::new(texture),
            path: None,
            kind: TextureKind::Cubemap,
        });
        Ok(())
    }

    /// The sampler name each entry is exposed under, in unit order.
    ///
    /// Numbering restarts on every call, so two meshes sharing a shader both start at
    /// `<kind>1`.
    pub fn sampler_names(&self) -> Vec<String> {
        let mut counters = [0u32; TextureKind::ALL.len()];
        self.entries
            .iter()
            .map(|texture| {
                let counter = &mut counters[texture.kind.index()];
                *counter += 1;
                format!("{}{}", texture.kind.uniform_prefix(), counter)
            })
            .collect()
    }

    /// Binds entry `i` to texture unit `i` and points the matching sampler of `shader` at it.
    ///
    /// Leaves `shader` in use and the textures bound, ready for a draw call.
    pub fn bind_for_shader(&self, shader: &ShaderProgram) -> Result<(), TextureError> {
        let available = self.max_units;
        if self.entries.len() > available {
            return Err(TextureError::TooManyUnits {
                needed: self.entries.len(),
                available,
            });
        }

        shader.use_program();
        for (unit, (texture, name)) in self.entries.iter().zip(self.sampler_names()).enumerate() {
            let unit = unit as u32;
            self.gl.active_texture(glow::TEXTURE0 + unit);
            shader.set_uniform(&name, unit as i32);
            self.gl
                .bind_texture(texture.kind.target(), Some(texture.handle.id));
        }
        Ok(())
    }

    /// Moves every entry of `other` to the end of this set.
    pub fn append(&mut self, mut other: TextureSet) {
        self.entries.append(&mut other.entries);
    }

    /// Appends entries sharing the GPU textures of `other`.
    pub fn extend_from(&mut self, other: &TextureSet) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct GPU textures behind the entries.
    pub fn distinct_handles(&self) -> usize {
        self.entries
            .iter()
            .map(|texture| texture.handle.id)
            .collect::<FxHashSet<_>>()
            .len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Texture> {
        self.entries.iter()
    }
}
