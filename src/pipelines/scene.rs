//! Per-frame uniforms of the model pipeline (bind group 1).

use cgmath::{Matrix4, Rad};
use wgpu::util::DeviceExt;

use crate::{camera::CameraUniform, config::LightConfig};

pub struct SceneResources {
    pub uniform: SceneUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub model: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub view_position: [f32; 4],
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    /// Ambient strength, specular strength, shininess and one padding float.
    pub shading: [f32; 4],
}

impl SceneUniform {
    pub fn new(light: &LightConfig) -> Self {
        let [px, py, pz] = light.position;
        let [r, g, b] = light.color;
        Self {
            model: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]],
            view_proj: CameraUniform::new().view_proj,
            view_position: [0.0; 4],
            light_position: [px, py, pz, 1.0],
            light_color: [r, g, b, 1.0],
            shading: [light.ambient_strength, light.specular_strength, light.shininess, 0.0],
        }
    }

    /// Takes the camera matrices and rotates the model by `angle` radians
    /// about +Y.
    pub fn update(&mut self, camera: &CameraUniform, angle: f32) {
        self.model = Matrix4::from_angle_y(Rad(angle)).into();
        self.view_proj = camera.view_proj;
        self.view_position = camera.view_position;
    }
}

impl SceneResources {
    pub fn new(device: &wgpu::Device, light: &LightConfig) -> Self {
        let uniform = SceneUniform::new(light);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, uniform: SceneUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Scene Uniform Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("scene_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("scene_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_shader_struct() {
        // 2 matrices + 4 vec4
        assert_eq!(std::mem::size_of::<SceneUniform>(), 2 * 64 + 4 * 16);
    }

    #[test]
    fn light_config_lands_in_the_uniform() {
        let uniform = SceneUniform::new(&LightConfig::default());
        assert_eq!(uniform.light_position, [3.0, 3.0, 3.0, 1.0]);
        assert_eq!(uniform.shading, [0.15, 0.6, 64.0, 0.0]);
    }

    #[test]
    fn quarter_turn_maps_x_onto_negative_z() {
        let mut uniform = SceneUniform::new(&LightConfig::default());
        uniform.update(&CameraUniform::new(), std::f32::consts::FRAC_PI_2);
        // column 0 is the image of +x
        let x = uniform.model[0];
        assert!(x[0].abs() < 1e-6);
        assert!((x[2] + 1.0).abs() < 1e-6);
    }
}
