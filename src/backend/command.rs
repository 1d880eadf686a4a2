// Command pool and one-shot command helpers
//
// Per-frame command buffers are allocated from the pool once and re-recorded
// every frame. Uploads (buffer copies, layout transitions, mipmap blits) use
// short-lived buffers that are submitted and waited on immediately.

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

pub struct CommandPool {
    pub pool: vk::CommandPool,
}

impl CommandPool {
    pub fn new(device: &VulkanDevice, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            // RESET: buffers are re-recorded individually every frame
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        Ok(Self { pool })
    }

    pub fn allocate(&self, device: &VulkanDevice, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { device.device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")
    }

    /// Start recording a throwaway command buffer
    pub fn begin_single_time(&self, device: &VulkanDevice) -> Result<vk::CommandBuffer> {
        let cmd = self.allocate(device, 1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        if let Err(e) = unsafe { device.device.begin_command_buffer(cmd, &begin_info) } {
            unsafe { device.device.free_command_buffers(self.pool, &[cmd]) };
            return Err(e).context("Failed to begin single-time command buffer");
        }

        Ok(cmd)
    }

    /// Submit to the graphics queue, wait for it to drain, then free the buffer
    pub fn end_single_time(&self, device: &VulkanDevice, cmd: vk::CommandBuffer) -> Result<()> {
        let command_buffers = [cmd];

        let result = unsafe {
            device
                .device
                .end_command_buffer(cmd)
                .context("Failed to record single-time command buffer")
                .and_then(|_| {
                    let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                    device
                        .device
                        .queue_submit(device.graphics_queue, &[submit_info.build()], vk::Fence::null())
                        .context("Failed to submit single-time command buffer")
                })
                .and_then(|_| {
                    device
                        .device
                        .queue_wait_idle(device.graphics_queue)
                        .context("Failed to wait for graphics queue")
                })
        };

        unsafe { device.device.free_command_buffers(self.pool, &command_buffers) };
        result
    }

    /// Record `record` into a one-shot buffer and run it to completion
    pub fn run_single_time<F>(&self, device: &VulkanDevice, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let cmd = self.begin_single_time(device)?;
        if let Err(e) = record(cmd) {
            unsafe { device.device.free_command_buffers(self.pool, &[cmd]) };
            return Err(e);
        }
        self.end_single_time(device, cmd)
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}
