use std::path::Path;

use lab_bridge::Archiver;

use crate::config::ArchiveArgs;
use crate::error::CliError;

pub fn run(args: ArchiveArgs) -> Result<(), CliError> {
    let config = args.common.effective()?;
    let archiver = Archiver::new(&config)?;
    let url = archiver
        .archive_csv(Path::new(&args.csv), &args.bucket, args.key.as_deref())
        .ok_or(CliError::Unavailable("archive"))?;
    println!("{url}");
    Ok(())
}
