//! Vulkan instance/device bootstrap.

use crate::render::Renderer;
use anyhow::{Context as _, Result, anyhow};
use ash::{Entry, Instance, vk};
use log::info;
use std::ffi::CStr;

/// Owns the Vulkan instance and the logical device created from the first
/// enumerated physical device. Constructed once at process start.
pub struct VulkanRenderer {
    _entry: Entry,
    instance: Instance,
    device: ash::Device,
}

impl VulkanRenderer {
    pub fn new() -> Result<Self> {
        let entry = unsafe { Entry::load() }.context("failed to load the Vulkan library")?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Polychrome")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"PolyEngine")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);
        let create_info = vk::InstanceCreateInfo::default().application_info(&app_info);

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.context("vkCreateInstance")?;

        // Drop only runs for a fully built renderer, so anything failing
        // past this point unwinds the instance by hand.
        match Self::create_device(&instance) {
            Ok(device) => Ok(Self {
                _entry: entry,
                instance,
                device,
            }),
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    fn create_device(instance: &Instance) -> Result<ash::Device> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .context("vkEnumeratePhysicalDevices")?;
        let physical_device = physical_devices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no Vulkan physical devices"))?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        info!("Vulkan device: {}", name.to_string_lossy());

        let device_info = vk::DeviceCreateInfo::default();
        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .context("vkCreateDevice")?;

        Ok(device)
    }
}

impl Renderer for VulkanRenderer {
    /// Frame hook; command recording and presentation are not wired up yet.
    fn draw_frame(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
