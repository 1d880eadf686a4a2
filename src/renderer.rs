// =============================================================================
// RENDERER - Every GPU resource for the textured model, plus the frame loop
// =============================================================================
//
// FRAME FLOW (per frame in flight):
// 1. Wait for this slot's fence (GPU done with its command buffer + uniforms)
// 2. Acquire swapchain image (signals image_available)
// 3. Update uniforms, re-record the command buffer
// 4. Submit (waits image_available, signals render_finished + fence)
// 5. Present (waits render_finished)
//
// Swapchain-sized resources (framebuffers, depth/MSAA targets, render_finished
// semaphores) are rebuilt on resize; everything else lives for the whole run.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::window::Window;

use crate::backend::sync::{create_semaphore, FrameSync};
use crate::backend::{descriptor, pipeline, Buffer, CommandPool, Image, Swapchain, VulkanDevice};
use crate::config::{Config, SceneConfig};
use crate::model::Mesh;
use crate::texture::{Texture, TextureData};
use crate::uniform::UniformBufferObject;

/// Main renderer struct holding all Vulkan resources.
///
/// Raw handles are destroyed in `Drop`; owning wrappers (buffers, images,
/// texture, swapchain) drop afterwards in field order, and the device goes
/// last once every `Arc` clone is gone.
pub struct Renderer {
    // ─────────────────────────────────────────────────────────────────────────
    // SETTINGS
    // ─────────────────────────────────────────────────────────────────────────
    scene: SceneConfig,
    clear_color: [f32; 4],
    preferred_present_mode: Option<vk::PresentModeKHR>,
    shader_paths: (PathBuf, PathBuf),
    samples: vk::SampleCountFlags,
    depth_format: vk::Format,
    start_time: Instant,

    // ─────────────────────────────────────────────────────────────────────────
    // PER FRAME IN FLIGHT
    // ─────────────────────────────────────────────────────────────────────────
    frame_sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<Buffer>,
    /// Which slot we're currently using (0 to frames_in_flight-1)
    current_frame: usize,

    // ─────────────────────────────────────────────────────────────────────────
    // SCENE RESOURCES
    // ─────────────────────────────────────────────────────────────────────────
    descriptor_pool: vk::DescriptorPool,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    /// Referenced by the descriptor sets, never read directly
    #[allow(dead_code)]
    texture: Texture,

    // ─────────────────────────────────────────────────────────────────────────
    // SWAPCHAIN-DEPENDENT
    // ─────────────────────────────────────────────────────────────────────────
    /// Indexed by swapchain image, not by frame slot
    render_finished: Vec<vk::Semaphore>,
    framebuffers: Vec<vk::Framebuffer>,
    depth_image: Image,
    color_image: Option<Image>,
    swapchain: Swapchain,

    // ─────────────────────────────────────────────────────────────────────────
    // PIPELINE
    // ─────────────────────────────────────────────────────────────────────────
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    descriptor_set_layout: vk::DescriptorSetLayout,
    command_pool: CommandPool,

    // ─────────────────────────────────────────────────────────────────────────
    // STATE FLAGS
    // ─────────────────────────────────────────────────────────────────────────
    /// Set when the window is resized - forces swapchain recreation after present
    framebuffer_resized: bool,
    /// Set when the window has zero area - skip rendering
    minimized: bool,

    device: Arc<VulkanDevice>,
    window: Arc<Window>,
}

impl Renderer {
    /// Initialize all Vulkan resources for `window`.
    pub fn new(config: &Config, window: Arc<Window>) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        // Validation only ever runs in debug builds
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let device = VulkanDevice::new(&config.window.title, enable_validation, &window)?;

        let preferred_present_mode = config.preferred_present_mode();
        let size = window.inner_size();
        let swapchain = Swapchain::new(device.clone(), size.width, size.height, preferred_present_mode, None)?;

        let samples = if config.graphics.msaa {
            device.max_usable_sample_count()
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        let depth_format = device.find_depth_format()?;
        log::info!("MSAA samples: {:?}, depth format: {:?}", samples, depth_format);

        let render_pass = pipeline::create_render_pass(&device, swapchain.format, depth_format, samples)?;
        log::info!("Render pass created");
        let descriptor_set_layout = pipeline::create_descriptor_set_layout(&device)?;
        log::info!("Descriptor set layout created");

        let shader_paths = (
            config.assets.vertex_shader.clone(),
            config.assets.fragment_shader.clone(),
        );
        let (pipeline, pipeline_layout) = pipeline::create_graphics_pipeline(
            &device,
            render_pass,
            descriptor_set_layout,
            samples,
            &shader_paths.0,
            &shader_paths.1,
        )?;
        log::info!("Graphics pipeline created");

        let command_pool = CommandPool::new(&device, device.graphics_queue_family)?;
        log::info!("Command pool created");

        let (color_image, depth_image) =
            Self::create_attachments(&device, &swapchain, depth_format, samples)?;
        let framebuffers = pipeline::create_framebuffers(
            &device,
            &swapchain.image_views,
            depth_image.view,
            color_image.as_ref().map(|image| image.view),
            render_pass,
            swapchain.extent,
        )?;
        log::info!("Created {} framebuffers", framebuffers.len());

        // Texture
        let texture_data = TextureData::load_or_fallback(&config.assets.texture)?;
        let texture = Texture::upload(&device, &command_pool, &texture_data, config.graphics.mipmaps)?;

        // Model
        let mesh = Mesh::load_or_fallback(&config.assets.model)?;
        let vertex_buffer = Buffer::device_local_with_data(
            &device,
            &command_pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &mesh.vertices,
            "vertices",
        )?;
        let index_buffer = Buffer::device_local_with_data(
            &device,
            &command_pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &mesh.indices,
            "indices",
        )?;
        let index_count = mesh.indices.len() as u32;
        log::info!(
            "Vertex and index buffers uploaded: {} vertices, {} indices",
            mesh.vertices.len(),
            index_count
        );

        // Per-frame resources
        let frames = config.frames_in_flight();
        let uniform_buffers = (0..frames)
            .map(|i| {
                Buffer::new(
                    &device,
                    std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryLocation::CpuToGpu,
                    &format!("uniforms {}", i),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!("Created {} uniform buffers", uniform_buffers.len());

        let descriptor_pool = descriptor::create_descriptor_pool(&device, frames as u32)?;
        let descriptor_sets = descriptor::allocate_descriptor_sets(
            &device,
            descriptor_pool,
            descriptor_set_layout,
            &uniform_buffers,
            texture.image.view,
            texture.sampler,
        )?;
        log::info!("Allocated {} descriptor sets", descriptor_sets.len());

        let command_buffers = command_pool.allocate(&device, frames as u32)?;
        log::info!("Allocated {} command buffers", command_buffers.len());

        let frame_sync = (0..frames)
            .map(|_| FrameSync::new(&device))
            .collect::<Result<Vec<_>>>()?;
        let render_finished = Self::create_render_finished(&device, swapchain.images.len())?;
        log::info!("Synchronization objects created");

        log::info!("Vulkan initialized successfully! ({} frames in flight)", frames);

        Ok(Self {
            scene: config.scene.clone(),
            clear_color: config.graphics.clear_color,
            preferred_present_mode,
            shader_paths,
            samples,
            depth_format,
            start_time: Instant::now(),
            frame_sync,
            command_buffers,
            descriptor_sets,
            uniform_buffers,
            current_frame: 0,
            descriptor_pool,
            vertex_buffer,
            index_buffer,
            index_count,
            texture,
            render_finished,
            framebuffers,
            depth_image,
            color_image,
            swapchain,
            pipeline,
            pipeline_layout,
            render_pass,
            descriptor_set_layout,
            command_pool,
            framebuffer_resized: false,
            minimized: false,
            device,
            window,
        })
    }

    fn create_attachments(
        device: &Arc<VulkanDevice>,
        swapchain: &Swapchain,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<(Option<Image>, Image)> {
        let color_image = if samples != vk::SampleCountFlags::TYPE_1 {
            Some(Image::msaa_color_target(device, swapchain.extent, swapchain.format, samples)?)
        } else {
            None
        };
        let depth_image = Image::depth_target(device, swapchain.extent, depth_format, samples)?;
        Ok((color_image, depth_image))
    }

    fn create_render_finished(device: &VulkanDevice, count: usize) -> Result<Vec<vk::Semaphore>> {
        (0..count).map(|_| create_semaphore(device)).collect()
    }

    // =========================================================================
    // STATE FROM WINDOW EVENTS
    // =========================================================================

    pub fn request_resize(&mut self) {
        self.framebuffer_resized = true;
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame. Returns false if nothing was drawn.
    pub fn draw_frame(&mut self) -> Result<bool> {
        if self.minimized {
            return Ok(false);
        }

        let frame = self.current_frame;
        let image_available = self.frame_sync[frame].image_available;
        let in_flight_fence = self.frame_sync[frame].in_flight_fence;

        // STEP 1: Wait until the GPU is done with this slot
        self.frame_sync[frame].wait(&self.device.device)?;

        // STEP 2: Acquire next swapchain image
        let Some((image_index, _suboptimal)) = self.swapchain.acquire_next_image(image_available)?
        else {
            self.recreate_swapchain()?;
            return Ok(false);
        };

        // Only reset once we know work will be submitted, or the next wait deadlocks
        self.frame_sync[frame].reset(&self.device.device)?;

        // STEP 3: Update uniforms and record commands
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let ubo = UniformBufferObject::new(elapsed, self.swapchain.aspect_ratio(), &self.scene);
        self.uniform_buffers[frame].write(&[ubo])?;

        let cmd = self.command_buffers[frame];
        self.record_command_buffer(cmd, image_index)?;

        // STEP 4: Submit
        let render_finished = self.render_finished[image_index as usize];
        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                in_flight_fence,
            )
        }
        .context("Failed to submit draw command buffer")?;

        // STEP 5: Present
        let needs_recreate = self.swapchain.present(
            self.device.present_queue,
            image_index,
            &signal_semaphores,
        )?;

        if needs_recreate || self.framebuffer_resized {
            self.framebuffer_resized = false;
            self.recreate_swapchain()?;
        }

        // STEP 6: Advance to next frame slot
        self.current_frame = (self.current_frame + 1) % self.frame_sync.len();

        Ok(true)
    }

    fn record_command_buffer(&self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()> {
        let device = &self.device.device;
        let extent = self.swapchain.extent;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin recording command buffer")?;

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT32);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[self.descriptor_sets[self.current_frame]],
                &[],
            );
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(cmd);

            device
                .end_command_buffer(cmd)
                .context("Failed to record command buffer")?;
        }

        Ok(())
    }

    // =========================================================================
    // SWAPCHAIN RECREATION
    // =========================================================================

    /// Rebuild everything sized to the swapchain after a resize or out-of-date surface.
    fn recreate_swapchain(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            self.minimized = true;
            return Ok(());
        }

        // Wait for GPU to finish all work before destroying resources
        self.device.wait_idle()?;
        self.destroy_swapchain_handles();

        let swapchain = Swapchain::new(
            self.device.clone(),
            size.width,
            size.height,
            self.preferred_present_mode,
            Some(&self.swapchain),
        )?;
        let old_format = self.swapchain.format;
        // Old swapchain is retired once the new one exists
        self.swapchain = swapchain;

        // Pipeline only depends on the render pass, which only depends on formats
        if self.swapchain.format != old_format {
            log::info!(
                "Swapchain format changed {:?} -> {:?}, rebuilding pipeline",
                old_format,
                self.swapchain.format
            );
            self.rebuild_pipeline()?;
        }

        // Drop the old targets before allocating new ones
        self.color_image = None;
        let (color_image, depth_image) =
            Self::create_attachments(&self.device, &self.swapchain, self.depth_format, self.samples)?;
        self.color_image = color_image;
        self.depth_image = depth_image;

        self.framebuffers = pipeline::create_framebuffers(
            &self.device,
            &self.swapchain.image_views,
            self.depth_image.view,
            self.color_image.as_ref().map(|image| image.view),
            self.render_pass,
            self.swapchain.extent,
        )?;
        self.render_finished = Self::create_render_finished(&self.device, self.swapchain.images.len())?;

        self.minimized = false;
        log::info!(
            "Swapchain recreated: {}x{} ({:?})",
            self.swapchain.extent.width,
            self.swapchain.extent.height,
            self.swapchain.present_mode
        );

        Ok(())
    }

    fn rebuild_pipeline(&mut self) -> Result<()> {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
        self.pipeline = vk::Pipeline::null();
        self.pipeline_layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();

        self.render_pass = pipeline::create_render_pass(
            &self.device,
            self.swapchain.format,
            self.depth_format,
            self.samples,
        )?;
        let (pipeline, pipeline_layout) = pipeline::create_graphics_pipeline(
            &self.device,
            self.render_pass,
            self.descriptor_set_layout,
            self.samples,
            &self.shader_paths.0,
            &self.shader_paths.1,
        )?;
        self.pipeline = pipeline;
        self.pipeline_layout = pipeline_layout;

        Ok(())
    }

    /// Destroy framebuffers and per-image semaphores, leaving the vectors empty
    fn destroy_swapchain_handles(&mut self) {
        pipeline::destroy_framebuffers(&self.device.device, &self.framebuffers);
        self.framebuffers.clear();

        for semaphore in self.render_finished.drain(..) {
            unsafe { self.device.device.destroy_semaphore(semaphore, None) };
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything
        let _ = self.device.wait_idle();

        self.destroy_swapchain_handles();

        let device = &self.device.device;
        unsafe {
            for sync in &self.frame_sync {
                sync.destroy(device);
            }

            // Null handles are ignored by vkDestroy*
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_render_pass(self.render_pass, None);

            // Also frees the descriptor sets
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }

        // Also frees the command buffers
        self.command_pool.destroy(device);

        // Buffers, images, texture and swapchain drop with the struct
        log::info!("Cleanup complete");
    }
}
