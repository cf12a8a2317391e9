use ahash::AHashMap;
use anyhow::Context;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use xpanel_core::calibration::{CalibrationMarker, StageCommands};
use xpanel_core::navigation::NavigationSnapshot;
use xpanel_core::render::AssetStore;
use xpanel_core::services::Camera;
use xpanel_core::{
    ActionRegistry, Calibration, CameraId, Compositor, ConfigPaths, Control, ExitMode,
    GripperMonitor, MenuConfig, MenuGraph, Navigator, NavigatorParts, PanelEvent, PanelSettings,
    Peripherals, ProcessSupervisor, Side,
};

use crate::bridge::{
    CommandCamera, CommandGripper, CommandRobot, FileCameraFeed, PngFileSink,
};
use crate::ipc;

/// Build a navigator wired to the command-backed hardware bridge
pub fn assemble(settings: PanelSettings) -> anyhow::Result<Navigator> {
    let menu = MenuConfig::load(&settings.menu_config)?;
    let graph = MenuGraph::build(&menu)
        .with_context(|| format!("Invalid menu {:?}", settings.menu_config))?;

    let hardware = &settings.hardware;
    let cameras: AHashMap<CameraId, Box<dyn Camera>> = CameraId::ALL
        .into_iter()
        .map(|id| {
            let camera: Box<dyn Camera> = Box::new(CommandCamera::new(id, hardware.clone()));
            (id, camera)
        })
        .collect();
    let feed = FileCameraFeed::new(
        settings.camera.frames_dir.clone(),
        Duration::from_millis(settings.camera.poll_ms),
    );
    let supervisor = ProcessSupervisor::new(Peripherals::new(cameras, Box::new(feed)));

    let sink = Arc::new(PngFileSink::new(settings.frame_output.clone()));
    let compositor = Compositor::new(
        AssetStore::new(settings.assets_dir.clone()),
        sink,
        settings.redraw_interval(),
    );

    let grippers = GripperMonitor::new(
        Box::new(CommandGripper::new(Side::Left, hardware.clone())),
        Box::new(CommandGripper::new(Side::Right, hardware.clone())),
    );
    let calibration = Calibration::new(
        CalibrationMarker::new(&settings.calibration_marker),
        StageCommands {
            arm: hardware.calibrate_arm.clone(),
            tare: hardware.tare.clone(),
        },
    );

    let navigator = Navigator::new(NavigatorParts {
        graph,
        supervisor,
        compositor,
        robot: Box::new(CommandRobot::new(hardware.clone())),
        grippers: Some(grippers),
        actions: ActionRegistry::with_builtins(),
        calibration,
        settings,
    })?;
    Ok(navigator)
}

/// Validate settings and menu without touching hardware
pub fn check(settings_path: &Path) -> anyhow::Result<()> {
    let settings = PanelSettings::load(settings_path);
    let menu_path = settings.menu_config.clone();
    let navigator = assemble(settings)?;
    println!(
        "{:?}: {} windows, starting at '{}'",
        menu_path,
        navigator.graph().window_count(),
        navigator.snapshot().active_window
    );
    Ok(())
}

/// Run the panel daemon; returns the process exit code
pub fn run(settings_path: &Path, paths: &ConfigPaths) -> anyhow::Result<i32> {
    info!("Initializing xpanel daemon");

    let settings = PanelSettings::load(settings_path);
    let socket = settings
        .socket_path
        .clone()
        .unwrap_or_else(|| paths.socket.clone());
    let gripper_poll = settings.gripper_poll();

    // Config errors are fatal before any input is accepted
    let mut navigator = assemble(settings)?;

    let runtime = Runtime::new()?;
    let (event_tx, mut event_rx) = mpsc::channel::<PanelEvent>(64);
    let snapshot = Arc::new(RwLock::new(navigator.snapshot().clone()));

    let ipc_tx = event_tx.clone();
    let ipc_snapshot = snapshot.clone();
    let ipc_socket = socket.clone();
    runtime.spawn(async move {
        if let Err(e) = ipc::serve(ipc_socket, ipc_tx, ipc_snapshot).await {
            error!("Input socket error: {}", e);
        }
    });

    let tick_tx = event_tx.clone();
    runtime.spawn(async move {
        let mut interval = tokio::time::interval(gripper_poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tick_tx.send(PanelEvent::GripperTick).await.is_err() {
                break;
            }
        }
    });

    let signal_tx = event_tx;
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            let _ = signal_tx.send(PanelEvent::Shutdown).await;
        }
    });

    let exit = dispatch(&mut navigator, &mut event_rx, &snapshot);

    navigator.handle(PanelEvent::Shutdown);
    runtime.shutdown_timeout(Duration::from_millis(500));
    if let Err(e) = std::fs::remove_file(&socket) {
        warn!("Failed to remove {:?}: {}", socket, e);
    }

    let code = exit.map(|mode| mode.exit_code()).unwrap_or(0);
    info!("xpanel daemon exiting with {}", code);
    Ok(code)
}

/// Handle events one at a time until an exit is requested or input stops
fn dispatch(
    navigator: &mut Navigator,
    events: &mut mpsc::Receiver<PanelEvent>,
    snapshot: &RwLock<NavigationSnapshot>,
) -> Option<ExitMode> {
    let control = navigator.start();
    *snapshot.write() = navigator.snapshot().clone();
    if let Control::Exit(mode) = control {
        return Some(mode);
    }

    while let Some(event) = events.blocking_recv() {
        if event == PanelEvent::Shutdown {
            return None;
        }
        let control = navigator.handle(event);
        *snapshot.write() = navigator.snapshot().clone();
        if let Control::Exit(mode) = control {
            return Some(mode);
        }
    }
    None
}
