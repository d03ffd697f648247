//! Per-window wgpu presentation of RGBA frames.
//!
//! Every window owns a surface and one texture. The texture is drawn with a single triangle that
//! covers the whole surface (see `shader.wgsl`).

use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

/// Shared wgpu objects.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        // No GL: it panics at random on some drivers.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        for adapter in instance.enumerate_adapters(Backends::PRIMARY) {
            log::debug!("graphics adapter: {}", describe(&adapter.get_info()));
        }

        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| anyhow!("no usable graphics adapter"))?;
        log::info!("rendering on {}", describe(&adapter.get_info()));

        // Camera frames can be larger than the downlevel texture limit.
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let descriptor = DeviceDescriptor {
            label: Some("handsign"),
            features: Features::empty(),
            limits,
        };
        let (device, queue) = adapter.request_device(&descriptor, None).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

fn describe(info: &AdapterInfo) -> String {
    let kind = match info.device_type {
        DeviceType::IntegratedGpu => "integrated",
        DeviceType::DiscreteGpu => "discrete",
        DeviceType::VirtualGpu => "virtual",
        DeviceType::Cpu => "software",
        DeviceType::Other => "unknown",
    };
    format!("{} ({kind}, {:?})", info.name, info.backend)
}

/// A window showing one image at its native size.
pub struct Renderer {
    gpu: Rc<Gpu>,
    // Declared before `window` so that it is dropped first.
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    bind_group: BindGroup,
    texture: Texture,
    texture_size: Extent3d,
    resolution: Resolution,
    window: winit::window::Window,
}

impl Renderer {
    /// Opens a fixed-size window titled `title`.
    pub fn open<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
        gpu: Rc<Gpu>,
    ) -> anyhow::Result<Self> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_resizable(false)
            .build(target)?;

        // SAFETY: `surface` is dropped before `window`, see the field order of `Renderer`.
        let surface = unsafe { gpu.instance.create_surface(&window)? };
        let surface_format = surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .copied()
            .context("graphics adapter cannot present to this window")?;

        let layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("frame"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let pipeline = frame_pipeline(&gpu.device, &layout, surface_format);
        let texture_size = Extent3d::default();
        let texture = frame_texture(&gpu.device, texture_size);
        let bind_group = frame_bind_group(&gpu.device, &layout, &texture);

        let renderer = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            layout,
            bind_group,
            texture,
            texture_size,
            resolution,
            window,
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    /// Uploads RGBA8 pixels of size `res` to the window's texture.
    pub fn update_texture(&mut self, res: Resolution, rgba: &[u8]) {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if size != self.texture_size {
            log::trace!("frame texture resized to {res}");
            self.texture = frame_texture(&self.gpu.device, size);
            self.texture_size = size;
            self.bind_group = frame_bind_group(&self.gpu.device, &self.layout, &self.texture);
        }

        let destination = ImageCopyTexture {
            texture: &self.texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        };
        let layout = ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: None,
        };
        self.gpu.queue.write_texture(destination, rgba, layout, size);
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = self.next_frame()?;
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        {
            let attachment = RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: true,
                },
            };
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(attachment)],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    /// Next surface texture, reconfiguring the surface once if it went stale.
    fn next_frame(&self) -> anyhow::Result<SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(e @ (SurfaceError::Lost | SurfaceError::Outdated)) => {
                log::debug!("{e}, reconfiguring surface");
                self.configure_surface();
                Ok(self.surface.get_current_texture()?)
            }
            Err(e) => bail!("cannot get the next window frame: {e}"),
        }
    }

    fn configure_surface(&self) {
        let actual = self.window.inner_size();
        if (actual.width, actual.height) != (self.resolution.width(), self.resolution.height()) {
            // Some window managers resize fixed-size windows anyway.
            log::warn!(
                "window is {}x{}, frames are {}",
                actual.width,
                actual.height,
                self.resolution
            );
        }
        log::debug!("surface {} as {:?}", self.resolution, self.surface_format);

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width: self.resolution.width(),
            height: self.resolution.height(),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };
        self.surface.configure(&self.gpu.device, &config);
    }
}

fn frame_texture(device: &Device, size: Extent3d) -> Texture {
    device.create_texture(&TextureDescriptor {
        label: Some("frame"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn frame_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let view = texture.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&SamplerDescriptor::default());
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("frame"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

fn frame_pipeline(
    device: &Device,
    layout: &BindGroupLayout,
    format: TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("frame"),
        source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("frame"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("frame"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "frag",
            targets: &[Some(ColorTargetState {
                format,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}
