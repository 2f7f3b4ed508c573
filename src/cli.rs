use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "rtlimage", about = "RTL8710 ELF to firmware image utility")]
pub struct Opts {
    /// Input ELF file
    #[structopt(parse(from_os_str))]
    pub elffile: PathBuf,

    /// Output directory
    #[structopt(short = "o", long = "outdir", parse(from_os_str))]
    pub outdir: Option<PathBuf>,

    /// Generate OTA files
    #[structopt(short = "a", long = "ota")]
    pub ota: bool,

    /// Skip images whose base address is outside the valid address range
    #[structopt(short = "s", long = "strict-address")]
    pub strict_address: bool,
}
