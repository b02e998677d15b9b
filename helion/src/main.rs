use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use ash::vk;
use clap::Parser;

use helion_render::{
    backends::{RayQuery, RtxPipeline},
    context::{HeadlessContext, HeadlessContextCreateInfo},
    renderer::{RenderMethod, RendererSwitch},
    sample::SampleApp,
};
use helion_rhi::{
    AshHandle,
    device::{Device, DeviceCreateInfo, DeviceExtensions},
    instance::{Instance, InstanceExtensions, Library},
};

const SAMPLE_WIDTH: u32 = 1008;
const SAMPLE_HEIGHT: u32 = 660;
const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
const OUTPUT_PATH: &str = "headless.ppm";

/// Headless progressive path tracer.
#[derive(Parser)]
struct Args {
    /// Scene file to render.
    #[arg(short = 'f', long = "filename", default_value = "robot_toon/robot-toon.gltf")]
    scene: PathBuf,

    /// HDR environment map.
    #[arg(short = 'e', long = "hdr", default_value = "std_env.hdr")]
    environment: PathBuf,

    /// Number of samples to accumulate per pixel.
    #[arg(short = 's', long = "samples", default_value_t = 64)]
    samples: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    let args = Args::parse();

    let library = Library::new();
    let instance_extensions = library.supported_extensions(InstanceExtensions {
        ext_debug_utils: true,
    });
    let instance = Instance::new(library, instance_extensions);

    let physical_device = instance
        .enumerate_physical_devices()
        .find(|device| {
            device.extensions().khr_acceleration_structure
                && device.extensions().khr_ray_tracing_pipeline
                && device.find_graphics_queue_family().is_some()
        })
        .context("no ray-tracing capable device found")?;
    log::info!("using {}", physical_device.name());

    let queue_family_index = physical_device
        .find_graphics_queue_family()
        .context("no graphics+compute queue family")?;

    // Request the full ray-tracing stack; whatever the driver lacks is
    // dropped and reflected in enabled_extensions.
    let device = Device::new(
        Arc::clone(&physical_device),
        DeviceCreateInfo {
            queue_family_index,
            extensions: DeviceExtensions {
                khr_acceleration_structure: true,
                khr_ray_tracing_pipeline: true,
                khr_ray_query: true,
                khr_deferred_host_operations: true,
                khr_buffer_device_address: true,
                khr_shader_clock: true,
            },
        },
    );
    let support_ray_query = device.enabled_extensions().khr_ray_query;

    let mut context = HeadlessContext::setup(HeadlessContextCreateInfo {
        device: Arc::clone(&device),
        queue_family_index,
        size: vk::Extent2D {
            width: SAMPLE_WIDTH,
            height: SAMPLE_HEIGHT,
        },
        color_format: COLOR_FORMAT,
        depth_format: None,
        use_dynamic_rendering: false,
    });
    context.create_color_target();
    context.create_depth_target();
    context.create_render_pass();
    context.create_framebuffer();

    let renderers = RendererSwitch::new(
        Box::new(RtxPipeline::default()),
        Box::new(RayQuery::default()),
    );
    let mut sample = SampleApp::new(context, renderers, support_ray_query);

    sample.load_environment_hdr(&args.environment)?;
    sample.load_scene(&args.scene)?;
    sample.create_render(RenderMethod::RtxPipeline);

    {
        let frame = sample.frame_mut();
        frame.set_sample_budget(args.samples);
        frame.rtx.max_depth = 10;
    }
    sample.frame_mut().set_render_region(vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent: vk::Extent2D {
            width: SAMPLE_WIDTH,
            height: SAMPLE_HEIGHT,
        },
    });

    log::info!("rendering {} samples at {SAMPLE_WIDTH}x{SAMPLE_HEIGHT}", args.samples);
    render_frame(&mut sample);

    sample.context().device().wait_idle();
    sample.dump_image(OUTPUT_PATH.as_ref())?;

    sample.destroy_resources();
    Ok(())
}

/// Records, submits and waits for one progressive frame.
fn render_frame(sample: &mut SampleApp) {
    sample.profiler_mut().begin_frame();

    sample.context_mut().create_command_buffer();
    let command_buffer = sample.context().command_buffer();

    sample.update_uniform_buffer();
    sample.render_scene(command_buffer);

    begin_post_pass(sample.context(), command_buffer);
    sample.draw_post(command_buffer);
    unsafe {
        sample
            .context()
            .device()
            .ash_handle()
            .cmd_end_render_pass(command_buffer);
    }

    sample.context().end_command_buffer();
    sample.context().submit_work(command_buffer);

    sample.profiler_mut().end_frame();
}

fn begin_post_pass(context: &HeadlessContext, command_buffer: vk::CommandBuffer) {
    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];

    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(context.render_pass())
        .framebuffer(context.framebuffer())
        .render_area(vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: context.size(),
        })
        .clear_values(&clear_values);

    unsafe {
        context.device().ash_handle().cmd_begin_render_pass(
            command_buffer,
            &begin_info,
            vk::SubpassContents::INLINE,
        );
    }
}
