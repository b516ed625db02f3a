//! Command building: render a logical operation in one backend's syntax.
//!
//! ```text
//! Operation          dism                                        wimlib-imagex
//! ─────────────────  ──────────────────────────────────────────  ──────────────────────────
//! Mount              /Mount-Wim /WimFile:I /index:N /MountDir:D  mount I N D
//! Unmount (commit)   /Unmount-Wim /MountDir:D /Commit            unmount D --commit
//! Unmount (discard)  /Unmount-Wim /MountDir:D /Discard           unmount D
//! ListMounts         /Get-MountedWimInfo                         (unsupported)
//! ListIndexes        /Get-WimInfo /WimFile:I                     info I
//! ```
//!
//! Every dism command starts with `/English` so its output parses the same on
//! every system locale.

use wimm_types::{
    normalize_index, Backend, CommandIntent, CommandSpec, Operation, WimError, WimResult,
};

/// Build the command that performs `operation` with `backend`.
///
/// Pure: no I/O, no hidden state. Fails fast on operations the backend
/// cannot perform and on blank required paths, so a malformed command never
/// reaches the job runner.
pub fn build_command(backend: Backend, operation: &Operation) -> WimResult<CommandSpec> {
    if !backend.supports(operation.kind()) {
        return Err(WimError::UnsupportedOperationForBackend {
            backend,
            operation: operation.kind(),
        });
    }

    let spec = match operation {
        Operation::Mount {
            image,
            index,
            mount_dir,
        } => {
            let image = required("image path", image)?;
            let mount_dir = required("mount directory", mount_dir)?;
            let index = normalize_index(index);
            match backend {
                Backend::Dism => dism(CommandIntent::Mount)
                    .arg("/Mount-Wim")
                    .arg(format!("/WimFile:{}", image))
                    .arg(format!("/index:{}", index))
                    .arg(format!("/MountDir:{}", mount_dir)),
                Backend::Wimlib => CommandSpec::new(backend, CommandIntent::Mount)
                    .arg("mount")
                    .arg(image)
                    .arg(index)
                    .arg(mount_dir),
            }
        }
        Operation::Unmount { mount_dir, commit } => {
            let mount_dir = required("mount directory", mount_dir)?;
            let intent = if *commit {
                CommandIntent::Commit
            } else {
                CommandIntent::Discard
            };
            match backend {
                Backend::Dism => dism(intent)
                    .arg("/Unmount-Wim")
                    .arg(format!("/MountDir:{}", mount_dir))
                    .arg(if *commit { "/Commit" } else { "/Discard" }),
                Backend::Wimlib => {
                    let spec = CommandSpec::new(backend, intent)
                        .arg("unmount")
                        .arg(mount_dir);
                    // wimlib discards unless told to commit
                    if *commit { spec.arg("--commit") } else { spec }
                }
            }
        }
        Operation::ListMounts => dism(CommandIntent::ListMounts).arg("/Get-MountedWimInfo"),
        Operation::ListIndexes { image } => {
            let image = required("image path", image)?;
            match backend {
                Backend::Dism => dism(CommandIntent::ListIndexes)
                    .arg("/Get-WimInfo")
                    .arg(format!("/WimFile:{}", image)),
                Backend::Wimlib => CommandSpec::new(backend, CommandIntent::ListIndexes)
                    .arg("info")
                    .arg(image),
            }
        }
    };

    Ok(spec)
}

fn dism(intent: CommandIntent) -> CommandSpec {
    CommandSpec::new(Backend::Dism, intent).arg("/English")
}

/// Trimmed value of a required parameter, or `InvalidOperation` when blank.
fn required<'a>(what: &str, value: &'a str) -> WimResult<&'a str> {
    match value.trim() {
        "" => Err(WimError::InvalidOperation(format!("{} is empty", what))),
        trimmed => Ok(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use proptest::prelude::*;
    use rstest::rstest;

    fn render(backend: Backend, operation: Operation) -> String {
        build_command(backend, &operation).unwrap().to_string()
    }

    #[test]
    fn dism_mount() {
        assert_snapshot!(
            render(Backend::Dism, Operation::mount("/images/install.wim", "3", "/mnt/wim")),
            @"dism /English /Mount-Wim /WimFile:/images/install.wim /index:3 /MountDir:/mnt/wim"
        );
    }

    #[test]
    fn wimlib_mount() {
        assert_snapshot!(
            render(Backend::Wimlib, Operation::mount("/images/install.wim", "3", "/mnt/wim")),
            @"wimlib-imagex mount /images/install.wim 3 /mnt/wim"
        );
    }

    #[test]
    fn dism_unmount_both_ways() {
        assert_snapshot!(
            render(Backend::Dism, Operation::unmount("/mnt/wim", true)),
            @"dism /English /Unmount-Wim /MountDir:/mnt/wim /Commit"
        );
        assert_snapshot!(
            render(Backend::Dism, Operation::unmount("/mnt/wim", false)),
            @"dism /English /Unmount-Wim /MountDir:/mnt/wim /Discard"
        );
    }

    #[test]
    fn wimlib_unmount_commit_adds_flag() {
        let spec = build_command(Backend::Wimlib, &Operation::unmount("/mnt/wim", true)).unwrap();
        assert_eq!(spec.args, vec!["unmount", "/mnt/wim", "--commit"]);
        assert_eq!(spec.intent, CommandIntent::Commit);
    }

    #[test]
    fn list_commands() {
        assert_snapshot!(
            render(Backend::Dism, Operation::ListMounts),
            @"dism /English /Get-MountedWimInfo"
        );
        assert_snapshot!(
            render(Backend::Dism, Operation::list_indexes("/images/install.wim")),
            @"dism /English /Get-WimInfo /WimFile:/images/install.wim"
        );
        assert_snapshot!(
            render(Backend::Wimlib, Operation::list_indexes("/images/install.wim")),
            @"wimlib-imagex info /images/install.wim"
        );
    }

    #[test]
    fn wimlib_cannot_list_mounts() {
        let err = build_command(Backend::Wimlib, &Operation::ListMounts).unwrap_err();
        assert!(matches!(err, WimError::UnsupportedOperationForBackend { .. }));
    }

    #[rstest]
    #[case(Operation::mount("", "1", "/mnt"))]
    #[case(Operation::mount("/img.wim", "1", "   "))]
    #[case(Operation::unmount("", true))]
    #[case(Operation::list_indexes(" "))]
    fn blank_required_paths_are_rejected(#[case] operation: Operation) {
        for backend in Backend::ALL {
            let err = build_command(backend, &operation).unwrap_err();
            assert!(matches!(err, WimError::InvalidOperation(_)), "{:?}", err);
        }
    }

    #[test]
    fn paths_are_trimmed() {
        let spec = build_command(
            Backend::Wimlib,
            &Operation::mount("  /img.wim ", " 2 ", " /mnt "),
        )
        .unwrap();
        assert_eq!(spec.args, vec!["mount", "/img.wim", "2", "/mnt"]);
    }

    proptest! {
        #[test]
        fn blank_index_becomes_default(ws in "[ \t\r\n]{0,8}") {
            for backend in Backend::ALL {
                let spec = build_command(backend, &Operation::mount("/img.wim", ws.clone(), "/mnt")).unwrap();
                let expected = match backend {
                    Backend::Dism => "/index:1",
                    Backend::Wimlib => "1",
                };
                prop_assert!(spec.args.iter().any(|a| a == expected));
            }
        }

        #[test]
        fn building_is_pure(
            image in "[A-Za-z0-9/._ -]{1,24}",
            index in "[0-9 ]{0,3}",
            dir in "[A-Za-z0-9/._ -]{1,24}",
            commit in any::<bool>(),
        ) {
            prop_assume!(!image.trim().is_empty() && !dir.trim().is_empty());
            for backend in Backend::ALL {
                for operation in [
                    Operation::mount(image.clone(), index.clone(), dir.clone()),
                    Operation::unmount(dir.clone(), commit),
                    Operation::list_indexes(image.clone()),
                ] {
                    let first = build_command(backend, &operation);
                    let second = build_command(backend, &operation);
                    prop_assert_eq!(first, second);
                }
            }
        }
    }
}
