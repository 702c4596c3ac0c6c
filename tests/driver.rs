use libc::c_int;
use spank_harness::option::{self, OptionDescriptor, OptionSlot};
use spank_harness::plugin::{PluginArgs, PluginUnderTest};
use spank_harness::{Driver, Report};
use std::ffi::CStr;
use std::sync::{Arc, Mutex};

type Events = Arc<Mutex<Vec<String>>>;

/// Records every call it receives into a shared event list.
struct RecordingPlugin {
    events: Events,
    init_rc: c_int,
    exit_rc: c_int,
    register: bool,
    post_opt: bool,
}

impl RecordingPlugin {
    fn new(events: &Events) -> Self {
        RecordingPlugin {
            events: Arc::clone(events),
            init_rc: 0,
            exit_rc: 0,
            register: true,
            post_opt: false,
        }
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PluginUnderTest for RecordingPlugin {
    fn name(&self) -> &str {
        "recorder"
    }

    fn plugin_type(&self) -> &str {
        "spank"
    }

    fn init(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> c_int {
        self.push(format!("init {}", args.as_slice().join(",")));
        if self.register {
            let events = Arc::clone(&self.events);
            option::register(
                options,
                OptionDescriptor::new("greet")
                    .takes_value("name")
                    .usage("Greet [name]")
                    .val(3)
                    .callback(move |val: c_int, optarg: Option<&CStr>, remote: bool| {
                        let optarg = optarg.map(|arg| arg.to_string_lossy().into_owned());
                        events
                            .lock()
                            .unwrap()
                            .push(format!("option {} {:?} {}", val, optarg, remote));
                        0
                    }),
            )
            .unwrap();
        }
        self.init_rc
    }

    fn init_post_opt(&mut self, _options: &mut OptionSlot, _args: &PluginArgs) -> Option<c_int> {
        if self.post_opt {
            self.push("init_post_opt".to_string());
            Some(0)
        } else {
            None
        }
    }

    fn exit(&mut self, _options: &mut OptionSlot, args: &PluginArgs) -> c_int {
        self.push(format!("exit {}", args.argc()));
        self.exit_rc
    }
}

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn run(plugin: &mut RecordingPlugin, args: &[&str]) -> (Report, String) {
    let args = PluginArgs::new(args.iter().copied()).unwrap();
    let mut driver = Driver::new(Vec::new());
    let report = driver.run(plugin, &args).unwrap();
    (report, String::from_utf8(driver.into_inner()).unwrap())
}

#[test]
fn option_is_delivered_before_exit() {
    let events = events();
    let mut plugin = RecordingPlugin::new(&events);

    let (report, output) = run(&mut plugin, &["a", "b"]);

    assert_eq!(
        report,
        Report {
            init: 0,
            option_callback: Some(0),
            init_post_opt: None,
            exit: 0,
        }
    );
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "init a,b".to_string(),
            "option 3 Some(\"test_arg\") false".to_string(),
            "exit 2".to_string(),
        ]
    );
    assert_eq!(
        output,
        "plugin_name: recorder\n\
         plugin_type: spank\n\
         slurm_spank_init returned 0\n\
         option callback returned 0\n\
         slurm_spank_exit returned 0\n"
    );
}

#[test]
fn failing_init_still_runs_exit() {
    let events = events();
    let mut plugin = RecordingPlugin::new(&events);
    plugin.init_rc = 7;
    plugin.exit_rc = -1;

    let (report, output) = run(&mut plugin, &[]);

    assert_eq!(report.init, 7);
    assert_eq!(report.exit, -1);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(events.lock().unwrap().last().unwrap(), "exit 0");
    assert!(output.contains("slurm_spank_init returned 7\n"));
    assert!(output.contains("slurm_spank_exit returned -1\n"));
}

#[test]
fn no_option_registered() {
    let events = events();
    let mut plugin = RecordingPlugin::new(&events);
    plugin.register = false;

    let (report, output) = run(&mut plugin, &[]);

    assert_eq!(report.option_callback, None);
    assert!(!output.contains("option callback"));
    assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn init_post_opt_runs_between_option_and_exit() {
    let events = events();
    let mut plugin = RecordingPlugin::new(&events);
    plugin.post_opt = true;

    let (report, output) = run(&mut plugin, &[]);

    assert_eq!(report.init_post_opt, Some(0));
    let events = events.lock().unwrap();
    assert!(events[1].starts_with("option"));
    assert_eq!(events[2], "init_post_opt");
    assert!(events[3].starts_with("exit"));
    assert!(output.contains("slurm_spank_init_post_opt returned 0\n"));
}

#[test]
fn custom_optarg_and_registered_option() {
    let events = events();
    let mut plugin = RecordingPlugin::new(&events);
    let args = PluginArgs::new(Vec::<String>::new()).unwrap();

    let mut driver = Driver::new(Vec::new()).with_optarg("world").unwrap();
    driver.run(&mut plugin, &args).unwrap();

    assert_eq!(events.lock().unwrap()[1], "option 3 Some(\"world\") false");
    let option = driver.options().get().unwrap();
    assert_eq!(option.name, "greet");
    assert_eq!(option.arginfo.as_deref(), Some("name"));
    assert_eq!(option.usage.as_deref(), Some("Greet [name]"));
}
