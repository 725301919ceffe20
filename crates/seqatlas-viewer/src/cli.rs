use anyhow::Result;
use seqatlas_viewer::util::config::{EndpointKind, ViewerConfig};
use std::ffi::OsString;

const DEFAULT_FRAMES: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub endpoint: Option<EndpointKind>,
    pub lookup_url: Option<String>,
    pub frames: u64,
    /// Point name to search for and fly to once connected.
    pub focus: Option<String>,
    /// GO term id, or a name prefix resolved through autocomplete.
    pub go: Option<String>,
    pub save_config: bool,
}

impl CliArgs {
    pub fn apply(&self, cfg: &mut ViewerConfig) {
        if let Some(endpoint) = &self.endpoint {
            cfg.endpoint = endpoint.clone();
        }
        if let Some(url) = &self.lookup_url {
            cfg.lookup_base_url = url.clone();
        }
    }
}

pub fn parse_args() -> Result<CliArgs> {
    parse_args_from(std::env::args_os().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = OsString>,
{
    let mut endpoint = None;
    let mut lookup_url = None;
    let mut frames = DEFAULT_FRAMES;
    let mut focus = None;
    let mut go = None;
    let mut save_config = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--endpoint" {
            let Some(value) = args.next() else {
                anyhow::bail!("--endpoint expects a ws:// url or socket path");
            };
            endpoint = Some(EndpointKind::parse(&value.to_string_lossy()));
        } else if arg == "--lookup-url" {
            let Some(value) = args.next() else {
                anyhow::bail!("--lookup-url expects a base url");
            };
            lookup_url = Some(value.to_string_lossy().into_owned());
        } else if arg == "--frames" {
            let Some(value) = args.next() else {
                anyhow::bail!("--frames expects a count");
            };
            let value = value.to_string_lossy();
            frames = value
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid frame count: {value}"))?;
        } else if arg == "--focus" {
            let Some(value) = args.next() else {
                anyhow::bail!("--focus expects a point name");
            };
            focus = Some(value.to_string_lossy().into_owned());
        } else if arg == "--go" {
            let Some(value) = args.next() else {
                anyhow::bail!("--go expects a GO term id or name");
            };
            go = Some(value.to_string_lossy().into_owned());
        } else if arg == "--save-config" {
            save_config = true;
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    Ok(CliArgs {
        endpoint,
        lookup_url,
        frames,
        focus,
        go,
        save_config,
    })
}
