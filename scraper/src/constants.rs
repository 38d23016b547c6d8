use const_format::concatcp;

pub const DEFAULT_HOST: &str = "http://service.shmetro.com";
pub const DEFAULT_OUTPUT_FILE: &str = "./shmetro-status.json";

// Loaded first so the site hands out a valid session token before the status query.
pub const LANDING_PATH: &str = "/gxyxqk/index.jhtml";

pub const STATUS_METHOD: &str = "doGetAllLineStatus";
pub const STATUS_PATH: &str = concatcp!("/i/sm?method=", STATUS_METHOD);
pub const STATUS_FORM: &[(&str, &str)] = &[("method", STATUS_METHOD)];

pub const REAL_PAGE_MARKER: &str = "<!DOCTYPE html";
pub const GATE_PAGE_MARKER: &str = "<html><body><script language=";

// The gate script navigates by handing `location="..."` to its last `eval`; that call is redirected into
// a capture function whose argument lands in a global we can read back.
pub const EXEC_TOKEN: &str = "eval";
pub const CAPTURE_FUNCTION: &str = "setFinalJs";
pub const CAPTURE_VARIABLE: &str = "FINAL_JS";
pub const CAPTURE_PRELUDE: &str =
    concatcp!("var ", CAPTURE_VARIABLE, "; function ", CAPTURE_FUNCTION, "(js){", CAPTURE_VARIABLE, " = js;}");
