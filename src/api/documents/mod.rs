pub mod functions;
pub mod handlers;
pub mod structures;

pub use handlers::{
    __path_create_request, __path_download_file, __path_get_template, __path_list_requests,
    __path_list_templates, create_request, download_file, get_template, init_routes,
    list_requests, list_templates,
};

pub use structures::{DocRequestDto, DocRequestView};
