// Buffer utilities for vertex, index, uniform and staging buffers
//
// Memory comes from gpu-allocator. Host-visible allocations are persistently
// mapped, so uploads are a plain memcpy into the mapped slice.

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::Pod;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use super::{CommandPool, VulkanDevice};

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
    allocation: Option<Allocation>,
    device: Arc<VulkanDevice>,
}

impl Buffer {
    /// Create a buffer and bind fresh memory from the allocator
    pub fn new(
        device: &Arc<VulkanDevice>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .with_context(|| format!("Failed to create buffer '{}'", name))?;

        // From here on Drop releases whatever has been created
        let mut this = Self {
            buffer,
            size,
            allocation: None,
            device: device.clone(),
        };

        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };
        let allocation = device
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .with_context(|| format!("Failed to allocate buffer memory for '{}'", name))?;

        let bind = unsafe {
            device
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bind.with_context(|| format!("Failed to bind buffer memory for '{}'", name))?;

        Ok(this)
    }

    /// Copy `data` into a host-visible buffer
    pub fn write<T: Pod>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .context("Buffer memory is not host visible")?;

        if bytes.len() > mapped.len() {
            anyhow::bail!("Write of {} bytes overflows buffer of {} bytes", bytes.len(), mapped.len());
        }
        mapped[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Upload `data` into a new device-local buffer through a staging buffer
    pub fn device_local_with_data<T: Pod>(
        device: &Arc<VulkanDevice>,
        pool: &CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[T],
        name: &str,
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;

        let mut staging = Self::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            &format!("{} staging", name),
        )?;
        staging.write(data)?;

        let buffer = Self::new(
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            MemoryLocation::GpuOnly,
            name,
        )?;

        staging.copy_to(device, pool, &buffer)?;
        log::debug!("Uploaded {} bytes to '{}'", size, name);

        Ok(buffer)
    }

    /// Record and run a full-size copy into `dst`
    pub fn copy_to(&self, device: &VulkanDevice, pool: &CommandPool, dst: &Buffer) -> Result<()> {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: self.size.min(dst.size),
        };

        pool.run_single_time(device, |cmd| {
            unsafe { device.device.cmd_copy_buffer(cmd, self.buffer, dst.buffer, &[region]) };
            Ok(())
        })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_buffer(self.buffer, None) };

        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator.lock().free(allocation) {
                log::error!("Failed to free buffer memory: {}", e);
            }
        }
    }
}
