//! Init-command wrapper (§4.1): when a Server/Module declares init
//! commands, we write a shell script into its data directory, bind-mount it
//! read-only into the container, and override the entrypoint to run it
//! before handing off to the image's own entrypoint.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::spec::BindMount;

/// Fixed path the init script is mounted at inside the container.
pub const INIT_SCRIPT_CONTAINER_PATH: &str = "/discopanel/init.sh";

/// Entrypoint fallback used when an image's own entrypoint can't be
/// determined from `Inspect` (the default image, itzg/minecraft-server,
/// invokes this script directly).
pub const DEFAULT_ENTRYPOINT: &[&str] = &["/start"];

/// Writes the init script to `<data_dir>/discopanel-init.sh`, returning the
/// bind mount that wires it into the container and the entrypoint override
/// that invokes it.
pub async fn prepare(
    data_dir: &Path,
    commands: &[String],
    original_entrypoint: &[String],
) -> std::io::Result<(BindMount, Vec<String>)> {
    let script_path = data_dir.join("discopanel-init.sh");
    let contents = render_script(commands, original_entrypoint);

    let mut file = tokio::fs::File::create(&script_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;

    let mount = BindMount {
        source: script_path.to_string_lossy().into_owned(),
        target: INIT_SCRIPT_CONTAINER_PATH.to_owned(),
        read_only: true,
    };
    let entrypoint = vec!["/bin/bash".to_owned(), INIT_SCRIPT_CONTAINER_PATH.to_owned()];

    Ok((mount, entrypoint))
}

fn render_script(commands: &[String], original_entrypoint: &[String]) -> String {
    let entrypoint = if original_entrypoint.is_empty() {
        DEFAULT_ENTRYPOINT.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>()
    } else {
        original_entrypoint.to_vec()
    };

    let mut script = String::from("#!/bin/bash\nset -e\n");
    for command in commands {
        script.push_str(command);
        script.push('\n');
    }
    script.push_str("exec ");
    script.push_str(&shell_join(&entrypoint));
    script.push('\n');
    script
}

fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|a| format!("'{}'", a.replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Translates a control-plane-internal path to the equivalent host path
/// when the control plane itself runs inside a container (§9). When both
/// `CONTROL_PLANE_DATA_DIR` and `HOST_DATA_PATH` are set and `path` is under
/// the former, rewrites the prefix to the latter; otherwise returns `path`
/// unchanged.
pub fn translate_to_host_path(path: &Path) -> PathBuf {
    let (Ok(internal), Ok(host)) = (
        std::env::var("CONTROL_PLANE_DATA_DIR"),
        std::env::var("HOST_DATA_PATH"),
    ) else {
        return path.to_path_buf();
    };

    match path.strip_prefix(&internal) {
        Ok(rest) => Path::new(&host).join(rest),
        Err(_) => path.to_path_buf(),
    }
}
