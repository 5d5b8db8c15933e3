//! The binding context shared by every GPU resource.
//!
//! [`Gpu`] is the narrow slice of OpenGL the renderer issues. It is implemented for
//! [`glow::Context`] and, in tests, by [`recording::RecordingGpu`], which emulates just enough of
//! a driver to check handle ownership and binding symmetry.
//!
//! [`Bound`] binds a target when created and rebinds the neutral (zero) handle when dropped, so
//! constructors leave no active binding behind on success or on any error path.

use glow::HasContext;

/// The OpenGL calls used by the renderer.
///
/// Method names and argument orders follow [`glow::HasContext`]. All methods are safe to call:
/// implementations must only be created on a thread with a current context.
pub trait Gpu {
    fn create_shader(&self, shader_type: u32) -> Result<glow::Shader, String>;
    fn shader_source(&self, shader: glow::Shader, source: &str);
    fn compile_shader(&self, shader: glow::Shader);
    fn get_shader_compile_status(&self, shader: glow::Shader) -> bool;
    fn get_shader_info_log(&self, shader: glow::Shader) -> String;
    fn delete_shader(&self, shader: glow::Shader);

    fn create_program(&self) -> Result<glow::Program, String>;
    fn attach_shader(&self, program: glow::Program, shader: glow::Shader);
    fn link_program(&self, program: glow::Program);
    fn get_program_link_status(&self, program: glow::Program) -> bool;
    fn get_program_info_log(&self, program: glow::Program) -> String;
    fn delete_program(&self, program: glow::Program);
    fn use_program(&self, program: Option<glow::Program>);

    fn get_uniform_location(&self, program: glow::Program, name: &str)
    -> Option<glow::UniformLocation>;
    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32);
    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, x: f32);
    fn uniform_3_f32(&self, location: Option<&glow::UniformLocation>, x: f32, y: f32, z: f32);
    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    );
    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&glow::UniformLocation>,
        transpose: bool,
        v: &[f32],
    );

    fn create_texture(&self) -> Result<glow::Texture, String>;
    fn delete_texture(&self, texture: glow::Texture);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<glow::Texture>);
    /// Uploads one image level to the texture bound to `target`.
    ///
    /// # Safety
    ///
    /// When `pixels` is `Some`, it must hold at least `width * height` pixels of `format` and
    /// `ty` under the current unpack alignment. The driver reads that many bytes from it.
    #[allow(clippy::too_many_arguments)]
    unsafe fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn generate_mipmap(&self, target: u32);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    fn pixel_store_i32(&self, parameter: u32, value: i32);

    fn create_buffer(&self) -> Result<glow::Buffer, String>;
    fn delete_buffer(&self, buffer: glow::Buffer);
    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);

    fn create_vertex_array(&self) -> Result<glow::VertexArray, String>;
    fn delete_vertex_array(&self, vertex_array: glow::VertexArray);
    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&self, index: u32);

    /// # Safety
    ///
    /// A vertex array must be bound whose element buffer holds at least `count` indices of
    /// `element_type` past `offset`, each naming a vertex its enabled attributes can read.
    unsafe fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32);

    /// # Safety
    ///
    /// A vertex array must be bound whose enabled attributes can read vertices
    /// `first..first + count`.
    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    fn create_framebuffer(&self) -> Result<glow::Framebuffer, String>;
    fn delete_framebuffer(&self, framebuffer: glow::Framebuffer);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<glow::Framebuffer>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<glow::Texture>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;

    fn create_renderbuffer(&self) -> Result<glow::Renderbuffer, String>;
    fn delete_renderbuffer(&self, renderbuffer: glow::Renderbuffer);
    fn bind_renderbuffer(&self, target: u32, renderbuffer: Option<glow::Renderbuffer>);
    fn renderbuffer_storage(&self, target: u32, internal_format: u32, width: i32, height: i32);
    fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<glow::Renderbuffer>,
    );

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, parameter: u32);
    fn disable(&self, parameter: u32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn polygon_mode(&self, face: u32, mode: u32);
    fn get_parameter_i32(&self, parameter: u32) -> i32;
}

impl Gpu for glow::Context {
    fn create_shader(&self, shader_type: u32) -> Result<glow::Shader, String> {
        unsafe { HasContext::create_shader(self, shader_type) }
    }

    fn shader_source(&self, shader: glow::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: glow::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn get_shader_compile_status(&self, shader: glow::Shader) -> bool {
        unsafe { HasContext::get_shader_compile_status(self, shader) }
    }

    fn get_shader_info_log(&self, shader: glow::Shader) -> String {
        unsafe { HasContext::get_shader_info_log(self, shader) }
    }

    fn delete_shader(&self, shader: glow::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<glow::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: glow::Program, shader: glow::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn link_program(&self, program: glow::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn get_program_link_status(&self, program: glow::Program) -> bool {
        unsafe { HasContext::get_program_link_status(self, program) }
    }

    fn get_program_info_log(&self, program: glow::Program) -> String {
        unsafe { HasContext::get_program_info_log(self, program) }
    }

    fn delete_program(&self, program: glow::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<glow::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn get_uniform_location(
        &self,
        program: glow::Program,
        name: &str,
    ) -> Option<glow::UniformLocation> {
        unsafe { HasContext::get_uniform_location(self, program, name) }
    }

    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32) {
        unsafe { HasContext::uniform_1_i32(self, location, x) }
    }

    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, x: f32) {
        unsafe { HasContext::uniform_1_f32(self, location, x) }
    }

    fn uniform_3_f32(&self, location: Option<&glow::UniformLocation>, x: f32, y: f32, z: f32) {
        unsafe { HasContext::uniform_3_f32(self, location, x, y, z) }
    }

    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        unsafe { HasContext::uniform_4_f32(self, location, x, y, z, w) }
    }

    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&glow::UniformLocation>,
        transpose: bool,
        v: &[f32],
    ) {
        unsafe { HasContext::uniform_matrix_4_f32_slice(self, location, transpose, v) }
    }

    fn create_texture(&self) -> Result<glow::Texture, String> {
        unsafe { HasContext::create_texture(self) }
    }

    fn delete_texture(&self, texture: glow::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, unit) }
    }

    fn bind_texture(&self, target: u32, texture: Option<glow::Texture>) {
        unsafe { HasContext::bind_texture(self, target, texture) }
    }

    unsafe fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                target,
                level,
                internal_format,
                width,
                height,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(pixels),
            )
        }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { HasContext::generate_mipmap(self, target) }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { HasContext::tex_parameter_i32(self, target, parameter, value) }
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        unsafe { HasContext::pixel_store_i32(self, parameter, value) }
    }

    fn create_buffer(&self) -> Result<glow::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn delete_buffer(&self, buffer: glow::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target, buffer) }
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { HasContext::buffer_data_u8_slice(self, target, data, usage) }
    }

    fn create_vertex_array(&self) -> Result<glow::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn delete_vertex_array(&self, vertex_array: glow::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self, index, size, data_type, normalized, stride, offset,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    unsafe fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32) {
        unsafe { HasContext::draw_elements(self, mode, count, element_type, offset) }
    }

    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, mode, first, count) }
    }

    fn create_framebuffer(&self) -> Result<glow::Framebuffer, String> {
        unsafe { HasContext::create_framebuffer(self) }
    }

    fn delete_framebuffer(&self, framebuffer: glow::Framebuffer) {
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<glow::Framebuffer>) {
        unsafe { HasContext::bind_framebuffer(self, target, framebuffer) }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<glow::Texture>,
        level: i32,
    ) {
        unsafe {
            HasContext::framebuffer_texture_2d(
                self,
                target,
                attachment,
                texture_target,
                texture,
                level,
            )
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { HasContext::check_framebuffer_status(self, target) }
    }

    fn create_renderbuffer(&self) -> Result<glow::Renderbuffer, String> {
        unsafe { HasContext::create_renderbuffer(self) }
    }

    fn delete_renderbuffer(&self, renderbuffer: glow::Renderbuffer) {
        unsafe { HasContext::delete_renderbuffer(self, renderbuffer) }
    }

    fn bind_renderbuffer(&self, target: u32, renderbuffer: Option<glow::Renderbuffer>) {
        unsafe { HasContext::bind_renderbuffer(self, target, renderbuffer) }
    }

    fn renderbuffer_storage(&self, target: u32, internal_format: u32, width: i32, height: i32) {
        unsafe { HasContext::renderbuffer_storage(self, target, internal_format, width, height) }
    }

    fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<glow::Renderbuffer>,
    ) {
        unsafe {
            HasContext::framebuffer_renderbuffer(
                self,
                target,
                attachment,
                renderbuffer_target,
                renderbuffer,
            )
        }
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { HasContext::clear_color(self, red, green, blue, alpha) }
    }

    fn clear(&self, mask: u32) {
        unsafe { HasContext::clear(self, mask) }
    }

    fn enable(&self, parameter: u32) {
        unsafe { HasContext::enable(self, parameter) }
    }

    fn disable(&self, parameter: u32) {
        unsafe { HasContext::disable(self, parameter) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn polygon_mode(&self, face: u32, mode: u32) {
        unsafe { HasContext::polygon_mode(self, face, mode) }
    }

    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        unsafe { HasContext::get_parameter_i32(self, parameter) }
    }
}

/// A binding point that [`Bound`] restores to the neutral handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Binding {
    Program,
    /// A texture target on the currently active unit.
    Texture(u32),
    Framebuffer,
    Renderbuffer,
    VertexArray,
    ArrayBuffer,
}

/// Scoped binding: binds on creation, rebinds zero on drop.
///
/// The element array buffer has no guard. Its binding is vertex array state and unbinding it
/// while a vertex array is bound would detach it from that array.
#[must_use = "the binding is released as soon as the guard is dropped"]
pub struct Bound<'a> {
    gl: &'a dyn Gpu,
    binding: Binding,
}

impl<'a> Bound<'a> {
    pub fn program(gl: &'a dyn Gpu, program: glow::Program) -> Self {
        gl.use_program(Some(program));
        Self {
            gl,
            binding: Binding::Program,
        }
    }

    pub fn texture(gl: &'a dyn Gpu, target: u32, texture: glow::Texture) -> Self {
        gl.bind_texture(target, Some(texture));
        Self {
            gl,
            binding: Binding::Texture(target),
        }
    }

    pub fn framebuffer(gl: &'a dyn Gpu, framebuffer: glow::Framebuffer) -> Self {
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
        Self {
            gl,
            binding: Binding::Framebuffer,
        }
    }

    pub fn renderbuffer(gl: &'a dyn Gpu, renderbuffer: glow::Renderbuffer) -> Self {
        gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
        Self {
            gl,
            binding: Binding::Renderbuffer,
        }
    }

    pub fn vertex_array(gl: &'a dyn Gpu, vertex_array: glow::VertexArray) -> Self {
        gl.bind_vertex_array(Some(vertex_array));
        Self {
            gl,
            binding: Binding::VertexArray,
        }
    }

    pub fn array_buffer(gl: &'a dyn Gpu, buffer: glow::Buffer) -> Self {
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        Self {
            gl,
            binding: Binding::ArrayBuffer,
        }
    }
}

impl Drop for Bound<'_> {
    fn drop(&mut self) {
        match self.binding {
            Binding::Program => self.gl.use_program(None),
            Binding::Texture(target) => self.gl.bind_texture(target, None),
            Binding::Framebuffer => self.gl.bind_framebuffer(glow::FRAMEBUFFER, None),
            Binding::Renderbuffer => self.gl.bind_renderbuffer(glow::RENDERBUFFER, None),
            Binding::VertexArray => self.gl.bind_vertex_array(None),
            Binding::ArrayBuffer => self.gl.bind_buffer(glow::ARRAY_BUFFER, None),
        }
    }
}

#[cfg(test)]
pub mod recording {
    //! A driverless [`Gpu`] that records what the renderer asks of it.

    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::num::NonZeroU32;
    use std::rc::Rc;

    use super::Gpu;

    /// A call worth asserting on from a test.
    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Clear(u32),
        DrawElements { mode: u32, count: i32 },
        DrawArrays { mode: u32, first: i32, count: i32 },
        TexImage {
            target: u32,
            internal_format: i32,
            width: i32,
            height: i32,
            format: u32,
        },
        PixelStore(u32, i32),
        GetParameter(u32),
        BufferData { target: u32, len: usize },
        PolygonMode(u32),
        Viewport(i32, i32, i32, i32),
        Enable(u32),
        Disable(u32),
        BindFramebuffer(Option<glow::Framebuffer>),
    }

    struct ShaderRecord {
        source: String,
        compiled: bool,
    }

    #[derive(Default)]
    struct ProgramRecord {
        attached: Vec<glow::Shader>,
        linked: bool,
    }

    #[derive(Default)]
    struct Attachments {
        color: Option<glow::Texture>,
        depth: Option<glow::Renderbuffer>,
    }

    #[derive(Default)]
    struct State {
        next_id: u32,
        shaders: HashMap<glow::Shader, ShaderRecord>,
        programs: HashMap<glow::Program, ProgramRecord>,
        textures: HashMap<glow::Texture, (i32, i32)>,
        buffers: HashSet<glow::Buffer>,
        vertex_arrays: HashSet<glow::VertexArray>,
        framebuffers: HashMap<glow::Framebuffer, Attachments>,
        renderbuffers: HashMap<glow::Renderbuffer, (i32, i32)>,
        double_deletes: usize,
        programs_created: usize,

        current_program: Option<glow::Program>,
        active_unit: u32,
        bound_textures: HashMap<(u32, u32), glow::Texture>,
        framebuffer: Option<glow::Framebuffer>,
        renderbuffer: Option<glow::Renderbuffer>,
        vertex_array: Option<glow::VertexArray>,
        array_buffer: Option<glow::Buffer>,
        element_buffer: Option<glow::Buffer>,

        locations: Vec<(glow::Program, String)>,
        int_uniforms: HashMap<(glow::Program, String), i32>,
        matrix_uniforms: HashMap<(glow::Program, String), Vec<f32>>,
        max_texture_units: i32,
        calls: Vec<Call>,
    }

    impl State {
        fn next(&mut self) -> NonZeroU32 {
            self.next_id += 1;
            NonZeroU32::new(self.next_id).unwrap()
        }

        fn location(
            &self,
            location: Option<&glow::UniformLocation>,
        ) -> Option<(glow::Program, String)> {
            let location = location?;
            let (program, name) = self.locations.get(location.0 as usize)?;
            (self.current_program == Some(*program)).then(|| (*program, name.clone()))
        }

        fn bound_texture_target(&self, target: u32) -> Option<glow::Texture> {
            let target = if (glow::TEXTURE_CUBE_MAP_POSITIVE_X..=glow::TEXTURE_CUBE_MAP_NEGATIVE_Z)
                .contains(&target)
            {
                glow::TEXTURE_CUBE_MAP
            } else {
                target
            };
            self.bound_textures.get(&(self.active_unit, target)).copied()
        }
    }

    /// Emulates a driver closely enough for ownership and binding tests.
    ///
    /// Shader sources containing `#error` fail to compile, programs with a stage containing
    /// `// link-fail` fail to link, and a framebuffer is complete only with a non-empty color
    /// texture and a non-empty renderbuffer attached. A uniform is active when its name appears
    /// in one of the program's stage sources.
    pub struct RecordingGpu {
        state: RefCell<State>,
    }

    impl RecordingGpu {
        pub fn new() -> Rc<Self> {
            Rc::new(Self {
                state: RefCell::new(State {
                    max_texture_units: 16,
                    ..State::default()
                }),
            })
        }

        pub fn set_max_texture_units(&self, units: i32) {
            self.state.borrow_mut().max_texture_units = units;
        }

        pub fn live_shaders(&self) -> usize {
            self.state.borrow().shaders.len()
        }

        /// Programs created over the whole lifetime, deleted ones included.
        pub fn programs_created(&self) -> usize {
            self.state.borrow().programs_created
        }

        pub fn live_programs(&self) -> usize {
            self.state.borrow().programs.len()
        }

        pub fn live_textures(&self) -> usize {
            self.state.borrow().textures.len()
        }

        pub fn live_buffers(&self) -> usize {
            self.state.borrow().buffers.len()
        }

        pub fn live_vertex_arrays(&self) -> usize {
            self.state.borrow().vertex_arrays.len()
        }

        pub fn live_framebuffers(&self) -> usize {
            self.state.borrow().framebuffers.len()
        }

        pub fn live_renderbuffers(&self) -> usize {
            self.state.borrow().renderbuffers.len()
        }

        /// Total live handles of every kind.
        pub fn live_handles(&self) -> usize {
            self.live_shaders()
                + self.live_programs()
                + self.live_textures()
                + self.live_buffers()
                + self.live_vertex_arrays()
                + self.live_framebuffers()
                + self.live_renderbuffers()
        }

        /// Deletes of handles that were never created or already deleted.
        pub fn double_deletes(&self) -> usize {
            self.state.borrow().double_deletes
        }

        pub fn current_program(&self) -> Option<glow::Program> {
            self.state.borrow().current_program
        }

        pub fn current_framebuffer(&self) -> Option<glow::Framebuffer> {
            self.state.borrow().framebuffer
        }

        pub fn texture_on_unit(&self, unit: u32, target: u32) -> Option<glow::Texture> {
            self.state.borrow().bound_textures.get(&(unit, target)).copied()
        }

        /// True when no texture, framebuffer, renderbuffer, vertex array or array buffer is bound.
        pub fn bindings_are_neutral(&self) -> bool {
            let state = self.state.borrow();
            state.bound_textures.is_empty()
                && state.framebuffer.is_none()
                && state.renderbuffer.is_none()
                && state.vertex_array.is_none()
                && state.array_buffer.is_none()
        }

        pub fn int_uniform(&self, program: glow::Program, name: &str) -> Option<i32> {
            self.state
                .borrow()
                .int_uniforms
                .get(&(program, name.to_string()))
                .copied()
        }

        pub fn matrix_uniform(&self, program: glow::Program, name: &str) -> Option<Vec<f32>> {
            self.state
                .borrow()
                .matrix_uniforms
                .get(&(program, name.to_string()))
                .cloned()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.borrow().calls.clone()
        }

        pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.state.borrow().calls.iter().filter(|c| predicate(c)).count()
        }

        pub fn clear_calls(&self) {
            self.state.borrow_mut().calls.clear();
        }
    }

    impl Gpu for RecordingGpu {
        fn create_shader(&self, _shader_type: u32) -> Result<glow::Shader, String> {
            let mut state = self.state.borrow_mut();
            let shader = glow::NativeShader(state.next());
            state.shaders.insert(
                shader,
                ShaderRecord {
                    source: String::new(),
                    compiled: false,
                },
            );
            Ok(shader)
        }

        fn shader_source(&self, shader: glow::Shader, source: &str) {
            if let Some(record) = self.state.borrow_mut().shaders.get_mut(&shader) {
                record.source = source.to_string();
            }
        }

        fn compile_shader(&self, shader: glow::Shader) {
            if let Some(record) = self.state.borrow_mut().shaders.get_mut(&shader) {
                record.compiled = !record.source.contains("#error");
            }
        }

        fn get_shader_compile_status(&self, shader: glow::Shader) -> bool {
            self.state
                .borrow()
                .shaders
                .get(&shader)
                .is_some_and(|record| record.compiled)
        }

        fn get_shader_info_log(&self, shader: glow::Shader) -> String {
            if self.get_shader_compile_status(shader) {
                String::new()
            } else {
                "0:1(1): error: #error directive".to_string()
            }
        }

        fn delete_shader(&self, shader: glow::Shader) {
            let mut state = self.state.borrow_mut();
            if state.shaders.remove(&shader).is_none() {
                state.double_deletes += 1;
            }
        }

        fn create_program(&self) -> Result<glow::Program, String> {
            let mut state = self.state.borrow_mut();
            let program = glow::NativeProgram(state.next());
            state.programs.insert(program, ProgramRecord::default());
            state.programs_created += 1;
            Ok(program)
        }

        fn attach_shader(&self, program: glow::Program, shader: glow::Shader) {
            if let Some(record) = self.state.borrow_mut().programs.get_mut(&program) {
                record.attached.push(shader);
            }
        }

        fn link_program(&self, program: glow::Program) {
            let mut state = self.state.borrow_mut();
            let linked = state.programs.get(&program).is_some_and(|record| {
                !record.attached.is_empty()
                    && record.attached.iter().all(|shader| {
                        state
                            .shaders
                            .get(shader)
                            .is_some_and(|s| s.compiled && !s.source.contains("// link-fail"))
                    })
            });
            if let Some(record) = state.programs.get_mut(&program) {
                record.linked = linked;
            }
        }

        fn get_program_link_status(&self, program: glow::Program) -> bool {
            self.state
                .borrow()
                .programs
                .get(&program)
                .is_some_and(|record| record.linked)
        }

        fn get_program_info_log(&self, program: glow::Program) -> String {
            if self.get_program_link_status(program) {
                String::new()
            } else {
                "error: linking failed".to_string()
            }
        }

        fn delete_program(&self, program: glow::Program) {
            let mut state = self.state.borrow_mut();
            if state.programs.remove(&program).is_none() {
                state.double_deletes += 1;
            }
            if state.current_program == Some(program) {
                state.current_program = None;
            }
        }

        fn use_program(&self, program: Option<glow::Program>) {
            self.state.borrow_mut().current_program = program;
        }

        fn get_uniform_location(
            &self,
            program: glow::Program,
            name: &str,
        ) -> Option<glow::UniformLocation> {
            let mut state = self.state.borrow_mut();
            let record = state.programs.get(&program)?;
            if !record.linked {
                return None;
            }
            let active = record.attached.iter().any(|shader| {
                state
                    .shaders
                    .get(shader)
                    .is_some_and(|s| s.source.contains(name))
            });
            if !active {
                return None;
            }
            let index = match state
                .locations
                .iter()
                .position(|(p, n)| *p == program && n == name)
            {
                Some(index) => index,
                None => {
                    state.locations.push((program, name.to_string()));
                    state.locations.len() - 1
                }
            };
            Some(glow::NativeUniformLocation(index as u32))
        }

        fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32) {
            let mut state = self.state.borrow_mut();
            if let Some(key) = state.location(location) {
                state.int_uniforms.insert(key, x);
            }
        }

        fn uniform_1_f32(&self, _location: Option<&glow::UniformLocation>, _x: f32) {}

        fn uniform_3_f32(
            &self,
            _location: Option<&glow::UniformLocation>,
            _x: f32,
            _y: f32,
            _z: f32,
        ) {
        }

        fn uniform_4_f32(
            &self,
            _location: Option<&glow::UniformLocation>,
            _x: f32,
            _y: f32,
            _z: f32,
            _w: f32,
        ) {
        }

        fn uniform_matrix_4_f32_slice(
            &self,
            location: Option<&glow::UniformLocation>,
            _transpose: bool,
            v: &[f32],
        ) {
            let mut state = self.state.borrow_mut();
            if let Some(key) = state.location(location) {
                state.matrix_uniforms.insert(key, v.to_vec());
            }
        }

        fn create_texture(&self) -> Result<glow::Texture, String> {
            let mut state = self.state.borrow_mut();
            let texture = glow::NativeTexture(state.next());
            state.textures.insert(texture, (0, 0));
            Ok(texture)
        }

        fn delete_texture(&self, texture: glow::Texture) {
            let mut state = self.state.borrow_mut();
            if state.textures.remove(&texture).is_none() {
                state.double_deletes += 1;
            }
            state.bound_textures.retain(|_, bound| *bound != texture);
        }

        fn active_texture(&self, unit: u32) {
            self.state.borrow_mut().active_unit = unit - glow::TEXTURE0;
        }

        fn bind_texture(&self, target: u32, texture: Option<glow::Texture>) {
            let mut state = self.state.borrow_mut();
            let key = (state.active_unit, target);
            match texture {
                Some(texture) => state.bound_textures.insert(key, texture),
                None => state.bound_textures.remove(&key),
            };
        }

        unsafe fn tex_image_2d(
            &self,
            target: u32,
            _level: i32,
            internal_format: i32,
            width: i32,
            height: i32,
            format: u32,
            _ty: u32,
            _pixels: Option<&[u8]>,
        ) {
            let mut state = self.state.borrow_mut();
            if let Some(texture) = state.bound_texture_target(target) {
                state.textures.insert(texture, (width, height));
            }
            state.calls.push(Call::TexImage {
                target,
                internal_format,
                width,
                height,
                format,
            });
        }

        fn generate_mipmap(&self, _target: u32) {}

        fn tex_parameter_i32(&self, _target: u32, _parameter: u32, _value: i32) {}

        fn pixel_store_i32(&self, parameter: u32, value: i32) {
            self.state
                .borrow_mut()
                .calls
                .push(Call::PixelStore(parameter, value));
        }

        fn create_buffer(&self) -> Result<glow::Buffer, String> {
            let mut state = self.state.borrow_mut();
            let buffer = glow::NativeBuffer(state.next());
            state.buffers.insert(buffer);
            Ok(buffer)
        }

        fn delete_buffer(&self, buffer: glow::Buffer) {
            let mut state = self.state.borrow_mut();
            if !state.buffers.remove(&buffer) {
                state.double_deletes += 1;
            }
        }

        fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>) {
            let mut state = self.state.borrow_mut();
            if target == glow::ELEMENT_ARRAY_BUFFER {
                state.element_buffer = buffer;
            } else {
                state.array_buffer = buffer;
            }
        }

        fn buffer_data_u8_slice(&self, target: u32, data: &[u8], _usage: u32) {
            self.state.borrow_mut().calls.push(Call::BufferData {
                target,
                len: data.len(),
            });
        }

        fn create_vertex_array(&self) -> Result<glow::VertexArray, String> {
            let mut state = self.state.borrow_mut();
            let vertex_array = glow::NativeVertexArray(state.next());
            state.vertex_arrays.insert(vertex_array);
            Ok(vertex_array)
        }

        fn delete_vertex_array(&self, vertex_array: glow::VertexArray) {
            let mut state = self.state.borrow_mut();
            if !state.vertex_arrays.remove(&vertex_array) {
                state.double_deletes += 1;
            }
        }

        fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
            let mut state = self.state.borrow_mut();
            state.vertex_array = vertex_array;
            // The element buffer binding belongs to the vertex array.
            state.element_buffer = None;
        }

        fn vertex_attrib_pointer_f32(
            &self,
            _index: u32,
            _size: i32,
            _data_type: u32,
            _normalized: bool,
            _stride: i32,
            _offset: i32,
        ) {
        }

        fn enable_vertex_attrib_array(&self, _index: u32) {}

        unsafe fn draw_elements(&self, mode: u32, count: i32, _element_type: u32, _offset: i32) {
            self.state
                .borrow_mut()
                .calls
                .push(Call::DrawElements { mode, count });
        }

        unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
            self.state
                .borrow_mut()
                .calls
                .push(Call::DrawArrays { mode, first, count });
        }

        fn create_framebuffer(&self) -> Result<glow::Framebuffer, String> {
            let mut state = self.state.borrow_mut();
            let framebuffer = glow::NativeFramebuffer(state.next());
            state.framebuffers.insert(framebuffer, Attachments::default());
            Ok(framebuffer)
        }

        fn delete_framebuffer(&self, framebuffer: glow::Framebuffer) {
            let mut state = self.state.borrow_mut();
            if state.framebuffers.remove(&framebuffer).is_none() {
                state.double_deletes += 1;
            }
            if state.framebuffer == Some(framebuffer) {
                state.framebuffer = None;
            }
        }

        fn bind_framebuffer(&self, _target: u32, framebuffer: Option<glow::Framebuffer>) {
            let mut state = self.state.borrow_mut();
            state.framebuffer = framebuffer;
            state.calls.push(Call::BindFramebuffer(framebuffer));
        }

        fn framebuffer_texture_2d(
            &self,
            _target: u32,
            attachment: u32,
            _texture_target: u32,
            texture: Option<glow::Texture>,
            _level: i32,
        ) {
            let mut state = self.state.borrow_mut();
            if let Some(framebuffer) = state.framebuffer
                && attachment == glow::COLOR_ATTACHMENT0
                && let Some(attachments) = state.framebuffers.get_mut(&framebuffer)
            {
                attachments.color = texture;
            }
        }

        fn check_framebuffer_status(&self, _target: u32) -> u32 {
            let state = self.state.borrow();
            let Some(framebuffer) = state.framebuffer else {
                return glow::FRAMEBUFFER_COMPLETE;
            };
            let Some(attachments) = state.framebuffers.get(&framebuffer) else {
                return glow::FRAMEBUFFER_UNDEFINED;
            };
            let (Some(color), Some(depth)) = (attachments.color, attachments.depth) else {
                return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
            };
            let non_empty = |size: Option<&(i32, i32)>| size.is_some_and(|&(w, h)| w > 0 && h > 0);
            if non_empty(state.textures.get(&color)) && non_empty(state.renderbuffers.get(&depth)) {
                glow::FRAMEBUFFER_COMPLETE
            } else {
                glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
            }
        }

        fn create_renderbuffer(&self) -> Result<glow::Renderbuffer, String> {
            let mut state = self.state.borrow_mut();
            let renderbuffer = glow::NativeRenderbuffer(state.next());
            state.renderbuffers.insert(renderbuffer, (0, 0));
            Ok(renderbuffer)
        }

        fn delete_renderbuffer(&self, renderbuffer: glow::Renderbuffer) {
            let mut state = self.state.borrow_mut();
            if state.renderbuffers.remove(&renderbuffer).is_none() {
                state.double_deletes += 1;
            }
        }

        fn bind_renderbuffer(&self, _target: u32, renderbuffer: Option<glow::Renderbuffer>) {
            self.state.borrow_mut().renderbuffer = renderbuffer;
        }

        fn renderbuffer_storage(
            &self,
            _target: u32,
            _internal_format: u32,
            width: i32,
            height: i32,
        ) {
            let mut state = self.state.borrow_mut();
            if let Some(renderbuffer) = state.renderbuffer {
                state.renderbuffers.insert(renderbuffer, (width, height));
            }
        }

        fn framebuffer_renderbuffer(
            &self,
            _target: u32,
            _attachment: u32,
            _renderbuffer_target: u32,
            renderbuffer: Option<glow::Renderbuffer>,
        ) {
            let mut state = self.state.borrow_mut();
            if let Some(framebuffer) = state.framebuffer
                && let Some(attachments) = state.framebuffers.get_mut(&framebuffer)
            {
                attachments.depth = renderbuffer;
            }
        }

        fn clear_color(&self, _red: f32, _green: f32, _blue: f32, _alpha: f32) {}

        fn clear(&self, mask: u32) {
            self.state.borrow_mut().calls.push(Call::Clear(mask));
        }

        fn enable(&self, parameter: u32) {
            self.state.borrow_mut().calls.push(Call::Enable(parameter));
        }

        fn disable(&self, parameter: u32) {
            self.state.borrow_mut().calls.push(Call::Disable(parameter));
        }

        fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
            self.state
                .borrow_mut()
                .calls
                .push(Call::Viewport(x, y, width, height));
        }

        fn polygon_mode(&self, _face: u32, mode: u32) {
            self.state.borrow_mut().calls.push(Call::PolygonMode(mode));
        }

        fn get_parameter_i32(&self, parameter: u32) -> i32 {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::GetParameter(parameter));
            match parameter {
                glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS => state.max_texture_units,
                _ => 0,
            }
        }
    }
}
