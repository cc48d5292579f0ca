use crate::cmd::ConfigArgs;
use crate::exit::{config_error, CliResult, SUCCESS};
use crate::output::{print_config, OutputFormat};

pub fn run(args: ConfigArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.queue.to_config()?;
    config
        .validate()
        .map_err(|err| config_error("invalid queue config", err))?;
    print_config(&config, format);
    Ok(SUCCESS)
}
