use cryptdev_core::error::{CryptdevError, CryptdevResult};
use cryptdev_luks::{RegexOutputParser, SystemContainerOps};
use cryptdev_provider::{CommandOutput, ContainerOps, ProcessRunner};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Records every argv and answers from a closure instead of spawning tools.
#[derive(Clone)]
struct ScriptedRunner {
    calls: Arc<Mutex<Vec<String>>>,
    respond: Arc<dyn Fn(&[&str]) -> CommandOutput + Send + Sync>,
}

impl ScriptedRunner {
    fn new(respond: impl Fn(&[&str]) -> CommandOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
        }
    }

    fn succeeding() -> Self {
        Self::new(|_| CommandOutput::default())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    type Error = CryptdevError;

    fn run(&self, argv: &[&str]) -> CryptdevResult<CommandOutput> {
        self.calls.lock().unwrap().push(argv.join(" "));
        Ok((self.respond)(argv))
    }
}

fn ops(runner: &ScriptedRunner) -> SystemContainerOps<ScriptedRunner> {
    SystemContainerOps::new(runner.clone(), RegexOutputParser::new())
}

#[test]
fn actions_issue_expected_command_lines() -> CryptdevResult<()> {
    let runner = ScriptedRunner::succeeding();
    let ops = ops(&runner);

    ops.create_container("/dev/loop0", Path::new("/k"))?;
    ops.open_container("/dev/loop0", Path::new("/k"), "vault")?;
    ops.close_container("vault")?;
    ops.add_key("/dev/loop0", Path::new("/k"), Path::new("/k2"))?;
    ops.remove_key("/dev/loop0", Path::new("/k2"))?;

    assert_eq!(
        runner.calls(),
        vec![
            "cryptsetup luksFormat -q /dev/loop0 /k",
            "cryptsetup --key-file /k open --type luks /dev/loop0 vault",
            "cryptsetup close vault",
            "cryptsetup luksAddKey /dev/loop0 /k2 --key-file /k",
            "cryptsetup luksRemoveKey /dev/loop0 -q --key-file /k2",
        ]
    );
    Ok(())
}

#[test]
fn failing_action_carries_target_and_stderr() {
    let runner = ScriptedRunner::new(|_| CommandOutput::new(2, "", "Device /dev/loop0 is busy."));
    let ops = ops(&runner);

    let err = ops
        .open_container("/dev/loop0", Path::new("/k"), "vault")
        .unwrap_err();
    match err {
        CryptdevError::ToolExecution {
            target,
            status,
            stderr,
            ..
        } => {
            assert_eq!(target, "/dev/loop0");
            assert_eq!(status, 2);
            assert_eq!(stderr, "Device /dev/loop0 is busy.");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }

    let err = ops.close_container("vault").unwrap_err();
    assert!(err.to_string().contains("`vault`"), "{err}");
}

#[test]
fn failing_action_keeps_stderr_untouched() {
    let runner = ScriptedRunner::new(|_| {
        CommandOutput::new(1, "Enter passphrase: ", "  No key available.\n")
    });

    match ops(&runner).add_key("/dev/loop0", Path::new("/k"), Path::new("/k2")) {
        Err(CryptdevError::ToolExecution { stderr, .. }) => {
            assert_eq!(stderr, "  No key available.\n");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let silent = ScriptedRunner::new(|_| CommandOutput::new(1, "only on stdout", ""));
    match ops(&silent).remove_key("/dev/loop0", Path::new("/k")) {
        Err(CryptdevError::ToolExecution { stderr, .. }) => assert_eq!(stderr, ""),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn is_container_maps_exit_status() -> CryptdevResult<()> {
    let yes = ScriptedRunner::succeeding();
    let no = ScriptedRunner::new(|_| CommandOutput::new(1, "", ""));

    assert!(ops(&yes).is_container("/dev/loop0")?);
    assert!(!ops(&no).is_container("/dev/loop0")?);
    assert_eq!(yes.calls(), vec!["cryptsetup isLuks /dev/loop0"]);
    Ok(())
}

#[test]
fn name_by_device_parses_crypt_row() -> CryptdevResult<()> {
    let open = ScriptedRunner::new(|_| CommandOutput::new(0, "loop loop0\ncrypt vault\n", ""));
    let closed = ScriptedRunner::new(|_| CommandOutput::new(0, "loop loop0\n", ""));

    assert_eq!(ops(&open).name_by_device("/dev/loop0")?, Some("vault".into()));
    assert_eq!(ops(&closed).name_by_device("/dev/loop0")?, None);
    assert_eq!(open.calls(), vec!["lsblk /dev/loop0 -nlo type,name"]);
    Ok(())
}

#[test]
fn name_by_device_fails_when_lsblk_fails() {
    let runner = ScriptedRunner::new(|_| {
        CommandOutput::new(32, "", "lsblk: /dev/nope: not a block device")
    });

    let err = ops(&runner).name_by_device("/dev/nope").unwrap_err();
    assert!(matches!(err, CryptdevError::ToolExecution { status: 32, .. }));
}

#[test]
fn device_by_name_treats_failure_as_not_open() -> CryptdevResult<()> {
    let active = ScriptedRunner::new(|_| {
        CommandOutput::new(0, "/dev/mapper/vault is active.\n  device:  /dev/loop0\n", "")
    });
    let inactive = ScriptedRunner::new(|_| CommandOutput::new(4, "", "vault is inactive."));

    assert_eq!(
        ops(&active).device_by_name("vault")?,
        Some("/dev/loop0".into())
    );
    assert_eq!(ops(&inactive).device_by_name("vault")?, None);
    assert_eq!(inactive.calls(), vec!["cryptsetup status vault"]);
    Ok(())
}

#[test]
fn generate_name_prefixes_device_uuid() -> CryptdevResult<()> {
    let runner = ScriptedRunner::new(|_| CommandOutput::new(0, "UUID\n", ""));
    assert_eq!(ops(&runner).generate_name("/dev/dummy")?, "luks-UUID");
    assert_eq!(runner.calls(), vec!["lsblk -n /dev/dummy -o UUID"]);

    let blank = ScriptedRunner::new(|_| CommandOutput::new(0, "\n", ""));
    match ops(&blank).generate_name("/dev/dummy") {
        Err(CryptdevError::ToolExecution {
            target,
            status,
            stderr,
            ..
        }) => {
            assert_eq!(target, "/dev/dummy");
            assert_eq!(status, 0);
            assert_eq!(stderr, "no UUID reported");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let failing = ScriptedRunner::new(|_| CommandOutput::new(1, "", "boom"));
    assert!(matches!(
        ops(&failing).generate_name("/dev/dummy"),
        Err(CryptdevError::ToolExecution { .. })
    ));
    Ok(())
}

#[test]
fn destroy_wipes_closed_container_only() -> CryptdevResult<()> {
    let runner = ScriptedRunner::new(|argv| match argv[0] {
        "lsblk" => CommandOutput::new(0, "loop loop0\n", ""),
        _ => CommandOutput::default(),
    });

    ops(&runner).destroy_container("/dev/loop0")?;
    assert_eq!(
        runner.calls(),
        vec!["lsblk /dev/loop0 -nlo type,name", "wipefs --all /dev/loop0"]
    );
    Ok(())
}

#[test]
fn destroy_closes_open_container_before_wiping() -> CryptdevResult<()> {
    let runner = ScriptedRunner::new(|argv| match argv[0] {
        "lsblk" => CommandOutput::new(0, "loop loop0\ncrypt vault\n", ""),
        _ => CommandOutput::default(),
    });

    ops(&runner).destroy_container("/dev/loop0")?;
    assert_eq!(
        runner.calls(),
        vec![
            "lsblk /dev/loop0 -nlo type,name",
            "cryptsetup close vault",
            "wipefs --all /dev/loop0",
        ]
    );
    Ok(())
}

#[test]
fn destroy_reports_wipe_failure() {
    let runner = ScriptedRunner::new(|argv| match argv[0] {
        "lsblk" => CommandOutput::new(0, "", ""),
        "wipefs" => CommandOutput::new(1, "", "wipefs: error: /dev/loop0: probing initialization failed"),
        _ => CommandOutput::default(),
    });

    let err = ops(&runner).destroy_container("/dev/loop0").unwrap_err();
    assert!(err.to_string().contains("probing initialization failed"), "{err}");
}
