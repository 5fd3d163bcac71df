use rama::{
    Layer as _, Service as _,
    error::OpaqueError,
    http::{
        Body, Request, Response,
        client::EasyHttpWebClient,
        layer::{map_request_body::MapRequestBodyLayer, map_response_body::MapResponseBodyLayer},
    },
    layer::MapErrLayer,
    service::BoxService,
};

/// HTTP(S) client used to reach the target.
///
/// No retries and no timeout layer: the driver bounds each
/// attempt itself and a failed attempt is simply reported.
pub fn new_http_client() -> BoxService<Request, Response, OpaqueError> {
    (
        MapResponseBodyLayer::new(Body::new),
        MapErrLayer::new(OpaqueError::from_std),
        MapRequestBodyLayer::new(Body::new),
    )
        .into_layer(EasyHttpWebClient::default())
        .boxed()
}
