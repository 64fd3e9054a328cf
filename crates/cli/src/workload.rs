//! Synthetic multi-context workload run against the headless driver.
//!
//! Each worker thread owns one surface and a chain of contexts that share
//! objects with each other. Every frame visits each context, binds the
//! frame's resources twice (offscreen pass, then default framebuffer) and
//! lets the state cache drop what the driver already has.

use crate::error::CliError;
use glstate_core::{
    BindStats, Buffer, BufferTarget, ContextError, DriverStats, Framebuffer, FramebufferTarget,
    HeadlessBackend, HeadlessSurface, PixelFormat, Platform, Program, RenderingContext,
    SharingGroupId, Texture, TextureTarget, VertexArray, Viewport,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;

/// Workload shape. Every field has a default so config files may be partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub threads: usize,
    /// Contexts per thread, chained into one sharing group.
    pub contexts: usize,
    pub frames: usize,
    pub texture_units: u32,
    /// Pixel format preset name.
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            contexts: 3,
            frames: 60,
            texture_units: 4,
            format: "rgba8".into(),
            width: 1280,
            height: 720,
        }
    }
}

impl WorkloadConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))
    }

    /// Rejects workloads that cannot run and resolves the pixel format.
    pub fn validate(&self) -> Result<PixelFormat, CliError> {
        if self.threads == 0 {
            return Err(CliError::Input("threads must be at least 1".into()));
        }
        if self.contexts == 0 {
            return Err(CliError::Input("contexts must be at least 1".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CliError::Input(format!(
                "viewport {}x{} is empty",
                self.width, self.height
            )));
        }
        Ok(PixelFormat::from_name(&self.format)?)
    }
}

/// Outcome of one workload run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub config: WorkloadConfig,
    pub driver: DriverStats,
    pub binds: BindStats,
    pub sharing_groups: Vec<SharingGroupId>,
}

impl Report {
    /// Fraction of bind-style calls the cache kept from the driver.
    pub fn elided_ratio(&self) -> f64 {
        match self.binds.total() {
            0 => 0.0,
            total => self.binds.elided as f64 / total as f64,
        }
    }
}

/// Runs the workload and collects driver and cache statistics.
pub fn run(config: &WorkloadConfig) -> Result<Report, CliError> {
    let format = config.validate()?;
    let platform = Platform::new(HeadlessBackend::new());

    let workers: Vec<_> = (0..config.threads)
        .map(|index| {
            let platform = platform.clone();
            let config = config.clone();
            thread::spawn(move || {
                let surface = HeadlessSurface::new(index as u64 + 1, format);
                run_thread(&platform, &surface, &config)
            })
        })
        .collect();

    let mut binds = BindStats::default();
    let mut sharing_groups = Vec::with_capacity(config.threads);
    for worker in workers {
        let outcome = match worker.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        let (stats, group) = outcome?;
        binds.issued += stats.issued;
        binds.elided += stats.elided;
        sharing_groups.push(group);
    }
    sharing_groups.sort();

    log::info!(
        "{} threads done: {} binds issued, {} elided",
        config.threads,
        binds.issued,
        binds.elided
    );

    Ok(Report {
        config: config.clone(),
        driver: platform.backend().stats(),
        binds,
        sharing_groups,
    })
}

struct FrameResources {
    program: Program,
    vertex_array: VertexArray,
    vertices: Buffer,
    indices: Buffer,
    target: Framebuffer,
    textures: Vec<Texture>,
}

impl FrameResources {
    fn create(
        ctx: &mut RenderingContext<HeadlessBackend>,
        units: u32,
    ) -> Result<Self, ContextError> {
        Ok(Self {
            program: Program::create(ctx)?,
            vertex_array: VertexArray::create(ctx)?,
            vertices: Buffer::create(ctx)?,
            indices: Buffer::create(ctx)?,
            target: Framebuffer::create(ctx)?,
            textures: (0..units)
                .map(|_| Texture::create(ctx, TextureTarget::Texture2D))
                .collect::<Result<_, _>>()?,
        })
    }

    fn bind_pass(
        &self,
        ctx: &mut RenderingContext<HeadlessBackend>,
        offscreen: bool,
        viewport: Viewport,
    ) -> Result<(), ContextError> {
        if offscreen {
            self.target.bind(ctx, FramebufferTarget::Both)?;
        } else {
            Framebuffer::bind_default(ctx, FramebufferTarget::Both)?;
        }
        ctx.set_viewport(viewport)?;
        self.program.bind(ctx)?;
        self.vertex_array.bind(ctx)?;
        self.vertices.bind(ctx, BufferTarget::Array)?;
        self.indices.bind(ctx, BufferTarget::ElementArray)?;
        for (unit, texture) in (0u32..).zip(&self.textures) {
            texture.bind(ctx, unit)?;
        }
        Ok(())
    }

    fn delete(self, ctx: &mut RenderingContext<HeadlessBackend>) -> Result<(), ContextError> {
        for texture in self.textures {
            texture.delete(ctx)?;
        }
        self.target.delete(ctx)?;
        self.indices.delete(ctx)?;
        self.vertices.delete(ctx)?;
        self.vertex_array.delete(ctx)?;
        self.program.delete(ctx)
    }
}

fn run_thread(
    platform: &Platform<HeadlessBackend>,
    surface: &HeadlessSurface,
    config: &WorkloadConfig,
) -> Result<(BindStats, SharingGroupId), ContextError> {
    let mut contexts: Vec<RenderingContext<HeadlessBackend>> = Vec::with_capacity(config.contexts);
    for _ in 0..config.contexts {
        let ctx = platform.create_context(surface, contexts.last())?;
        contexts.push(ctx);
    }
    let group = contexts[0].sharing_group_id();
    let viewport = Viewport::new(0, 0, config.width, config.height);

    contexts[0].make_current(surface)?;
    let resources = FrameResources::create(&mut contexts[0], config.texture_units)?;

    for _ in 0..config.frames {
        for ctx in contexts.iter_mut() {
            ctx.make_current(surface)?;
            resources.bind_pass(ctx, true, viewport)?;
            resources.bind_pass(ctx, false, viewport)?;
        }
    }

    contexts[0].make_current(surface)?;
    resources.delete(&mut contexts[0])?;
    platform.unset_current()?;

    let stats = contexts.iter().fold(BindStats::default(), |acc, ctx| {
        let s = ctx.bind_stats();
        BindStats {
            issued: acc.issued + s.issued,
            elided: acc.elided + s.elided,
        }
    });
    log::debug!(
        "{group}: {} contexts, {} binds issued, {} elided",
        contexts.len(),
        stats.issued,
        stats.elided
    );
    Ok((stats, group))
}
