use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tidewater_ocean::{SetupOptions, StepKind, find_task, setup_task};

fn options(work_dir: &Path) -> SetupOptions {
    SetupOptions {
        work_dir: work_dir.to_path_buf(),
        machine_config: None,
        user_config: None,
        runtime_configs: Vec::new(),
        suite: None,
        cpu_count: 128,
        slurm: None,
    }
}

#[test]
fn manufactured_solution_setup_writes_model_inputs() {
    let dir = tempfile::tempdir().expect("tmp");
    let entry = find_task("manufactured_solution").expect("task");
    let report = setup_task(entry, &options(dir.path())).expect("setup");

    let names: Vec<&str> = report.task.steps.iter().map(|step| step.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "init_200km",
            "forward_200km",
            "init_100km",
            "forward_100km",
            "init_50km",
            "forward_50km",
            "init_25km",
            "forward_25km",
            "analysis",
        ]
    );

    let forward = report.task_dir.join("forward_200km");
    let namelist = fs::read_to_string(forward.join("namelist.ocean")).expect("namelist");
    assert!(namelist.contains("config_dt = '00:10:00'"));
    assert!(namelist.contains("config_btr_dt = '00:05:00'"));
    assert!(namelist.contains("config_run_duration = '0000_10:00:00'"));
    assert!(namelist.contains("config_time_integrator = 'split_explicit'"));
    assert!(namelist.contains("config_use_constant_f = .true."));

    let streams = fs::read_to_string(forward.join("streams.ocean")).expect("streams");
    assert!(streams.contains("<immutable_stream name=\"mesh\""));
    assert!(streams.contains("<stream name=\"output\""));
    assert!(streams.contains("io_type=\"pnetcdf,cdf5\""));
    assert!(streams.contains("output_interval=\"0000_10:00:00\""));
    assert!(streams.contains("<var name=\"ssh\"/>"));

    let run = fs::read_to_string(forward.join("run.sh")).expect("run.sh");
    assert!(run.contains("mpirun -n"));
    assert!(run.contains("ocean_model -n namelist.ocean -s streams.ocean"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(forward.join("step.json")).expect("manifest"))
            .expect("json");
    assert_eq!(manifest["kind"], "forward");
    assert_eq!(manifest["inputs"][0]["target"], "../init_200km/initial_state.nc");

    #[cfg(unix)]
    {
        let link = fs::read_link(forward.join("init.nc")).expect("link");
        assert_eq!(link, Path::new("../init_200km/initial_state.nc"));
    }
}

#[test]
fn task_config_and_job_script_are_written() {
    let dir = tempfile::tempdir().expect("tmp");
    let entry = find_task("ocean/spherical/cosine_bell/convergence").expect("task");
    let mut options = options(dir.path());
    options.suite = Some("nightly".to_string());
    let report = setup_task(entry, &options).expect("setup");

    let config = fs::read_to_string(&report.config_path).expect("config");
    assert!(report.config_path.ends_with("cosine_bell.cfg"));
    assert!(config.contains("# source: task(cosine_bell.cfg)"));
    assert!(config.contains("# source: defaults(default.cfg)"));
    assert!(config.contains("system = single_node"));
    assert!(config.contains("cores_per_node = 128"));

    assert!(report.job_script.ends_with("job_script.nightly.sh"));
    let script = fs::read_to_string(&report.job_script).expect("job script");
    assert!(script.contains("--job-name=tidewater_nightly"));
    assert!(script.contains("(cd forward_60km && bash run.sh)"));
    assert!(script.contains("(cd analysis && bash run.sh)"));
    // sqrt(819 * 82) cores over 128-core nodes.
    assert!(script.contains("#SBATCH  --nodes=3\n"));

    // The finest mesh keeps its request; its launch fits the node.
    let finest = report.task.step("forward_60km").expect("forward");
    assert_eq!(finest.resources.ntasks, 819);
    assert_eq!(finest.resources.min_tasks, 82);
    assert_eq!(report.launch["forward_60km"].ntasks, 128);
    for (name, launch) in &report.launch {
        assert!(launch.ntasks <= 128, "{name}");
    }
    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(report.task_dir.join("forward_60km/step.json")).expect("manifest"),
    )
    .expect("json");
    assert_eq!(manifest["resources"]["ntasks"], 819);
    assert_eq!(manifest["launch"]["ntasks"], 128);
    let analysis = report.task.step("analysis").expect("analysis");
    assert_eq!(analysis.kind, StepKind::Analysis);
    assert_eq!(analysis.inputs.len(), 8);
}

#[test]
fn runtime_config_overrides_task_layer() {
    let dir = tempfile::tempdir().expect("tmp");
    let runtime = dir.path().join("override.cfg");
    fs::write(
        &runtime,
        "[vertical_grid]\ngrid_type = z-level\n\n[merry_go_round]\nresolutions = 5.0, 2.5\n",
    )
    .expect("write");
    let entry = find_task("merry_go_round").expect("task");
    let mut options = options(&dir.path().join("work"));
    options.runtime_configs.push(runtime);
    let report = setup_task(entry, &options).expect("setup");

    assert_eq!(report.task.steps.len(), 5);
    assert!(report.task.step("forward_2.5km").is_some());
    let config = fs::read_to_string(&report.config_path).expect("config");
    assert!(config.contains("grid_type = z-level"));

    let namelist = fs::read_to_string(report.task_dir.join("forward_5km/namelist.ocean"))
        .expect("namelist");
    assert!(namelist.contains("config_horiz_tracer_adv_order = 3"));
    assert!(namelist.contains("config_use_debugTracers = .true."));
}

#[test]
fn unsupported_netcdf_is_rejected_before_writing() {
    let dir = tempfile::tempdir().expect("tmp");
    let runtime = dir.path().join("io.cfg");
    fs::write(&runtime, "[io]\nformat = NETCDF3_64BIT_DATA\nengine = scipy\n").expect("write");
    let entry = find_task("inertial_gravity_wave").expect("task");
    let work = dir.path().join("work");
    let mut options = options(&work);
    options.runtime_configs.push(runtime);

    let err = setup_task(entry, &options).unwrap_err();
    assert!(err.to_string().contains("io:engine"));
    assert!(!work.exists());
}

#[test]
fn small_machine_keeps_requested_resources() {
    let dir = tempfile::tempdir().expect("tmp");
    let entry = find_task("manufactured_solution").expect("task");
    let mut options = options(dir.path());
    options.cpu_count = 8;
    let report = setup_task(entry, &options).expect("setup on 8 cores");

    // 2500 cells fit on 8 cores; 40000 cells need at least 20 tasks.
    assert_eq!(report.launch["forward_200km"].ntasks, 8);
    let coarse = fs::read_to_string(report.task_dir.join("forward_200km/run.sh")).expect("run.sh");
    assert!(coarse.contains("gpmetis graph.info 8"));
    assert!(coarse.contains("mpirun -n 8 ocean_model"));
    assert_eq!(report.launch["forward_50km"].ntasks, 200);
    let fine = fs::read_to_string(report.task_dir.join("forward_50km/run.sh")).expect("run.sh");
    assert!(fine.contains("mpirun -n 200 ocean_model"));

    // The job is sized from the requests: sqrt(800 * 80) cores over 8-core nodes.
    let script = fs::read_to_string(&report.job_script).expect("job script");
    assert!(report.job_script.ends_with("job_script.sh"));
    assert!(script.contains("#SBATCH  --nodes=32\n"));
}

#[test]
fn login_system_writes_serial_commands() {
    let dir = tempfile::tempdir().expect("tmp");
    let runtime = dir.path().join("login.cfg");
    fs::write(&runtime, "[parallel]\nsystem = login\n").expect("write");
    let entry = find_task("single_column").expect("task");
    let mut options = options(&dir.path().join("work"));
    options.runtime_configs.push(runtime);
    let report = setup_task(entry, &options).expect("setup on login");

    let config = fs::read_to_string(&report.config_path).expect("config");
    assert!(config.contains("system = login"));
    let run = fs::read_to_string(report.task_dir.join("forward/run.sh")).expect("run.sh");
    assert!(!run.contains("mpirun"));
    assert!(run.contains("\nocean_model -n namelist.ocean -s streams.ocean\n"));
}

#[test]
fn single_column_uses_ekman_options() {
    let dir = tempfile::tempdir().expect("tmp");
    let entry = find_task("ocean/single_column/ekman").expect("task");
    let report = setup_task(entry, &options(dir.path())).expect("setup");

    assert!(report.task.convergence.is_none());
    let forward = report.task_dir.join("forward");
    let namelist = fs::read_to_string(forward.join("namelist.ocean")).expect("namelist");
    assert!(namelist.contains("config_dt = '00:10:00'"));
    assert!(namelist.contains("config_run_duration = '0010_00:00:00'"));
    assert!(namelist.contains("config_use_bulk_wind_stress = .true."));
    let streams = fs::read_to_string(forward.join("streams.ocean")).expect("streams");
    assert!(streams.contains("<immutable_stream name=\"forcing_data\""));

    // A single task runs the model without partitioning.
    let run = fs::read_to_string(forward.join("run.sh")).expect("run.sh");
    assert!(!run.contains("gpmetis"));
    assert!(run.contains("mpirun -n 1 ocean_model"));
}
