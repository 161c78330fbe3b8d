//! The gRPC adapter: translates the wire method table of spec.md §6 onto
//! the routing/replication/membership/maintenance modules. This is the
//! only module that knows about tonic.

use tonic::{Request, Response, Status};

use crate::chord_proto;
use crate::chord_proto::chord_server::Chord;
use crate::kv::Place;
use crate::maintenance;
use crate::membership;
use crate::noderef::dial;
use crate::replication;
use crate::routing::{self, node_ref_from_msg, node_ref_to_msg};
use crate::state::NodeHandle;

pub struct ChordService {
    pub handle: NodeHandle,
}

#[tonic::async_trait]
impl Chord for ChordService {
    async fn lookup(
        &self,
        request: Request<chord_proto::LookupRequest>,
    ) -> Result<Response<chord_proto::KvResultMsg>, Status> {
        let key = request.into_inner().key;
        let result = routing::lookup(&self.handle, &key).await?;
        Ok(Response::new(result.into()))
    }

    async fn find_successor(
        &self,
        request: Request<chord_proto::FindSuccessorRequest>,
    ) -> Result<Response<chord_proto::NodeRefMsg>, Status> {
        let id = request.into_inner().id;
        let successor = routing::find_successor(&self.handle, id).await?;
        Ok(Response::new(node_ref_to_msg(&successor)))
    }

    async fn get_predecessor(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::NodeRefMsg>, Status> {
        let predecessor = self.handle.state.lock().unwrap().predecessor.clone();
        Ok(Response::new(node_ref_to_msg(&predecessor)))
    }

    async fn get_successor(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::NodeRefMsg>, Status> {
        let successor = self.handle.state.lock().unwrap().successor.clone();
        Ok(Response::new(node_ref_to_msg(&successor)))
    }

    async fn get_id(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::IdMsg>, Status> {
        Ok(Response::new(chord_proto::IdMsg {
            id: self.handle.self_ref.id,
        }))
    }

    async fn put(
        &self,
        request: Request<chord_proto::PutRequest>,
    ) -> Result<Response<chord_proto::KvResultMsg>, Status> {
        let req = request.into_inner();
        let result = replication::put(&self.handle, &req.key, &req.value).await?;
        Ok(Response::new(result.into()))
    }

    async fn do_put(
        &self,
        request: Request<chord_proto::DoPutRequest>,
    ) -> Result<Response<chord_proto::KvResultMsg>, Status> {
        let req = request.into_inner();
        let place: Place = req.place.into();
        let result = match place {
            Place::Local => replication::do_put(&self.handle, &req.key, &req.value, place).await?,
            Place::Predecessor | Place::Successor => {
                let mut state = self.handle.state.lock().unwrap();
                let store = if place == Place::Predecessor {
                    &mut state.pred_replica_store
                } else {
                    &mut state.succ_replica_store
                };
                replication::insert_lww(store, &req.key, &req.value, req.seq);
                crate::kv::KvResult::valid(req.key, req.value, self.handle.self_ref.id)
            }
        };
        Ok(Response::new(result.into()))
    }

    async fn notify(
        &self,
        request: Request<chord_proto::NodeRefMsg>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        let candidate = node_ref_from_msg(request.into_inner());
        membership::notify(&self.handle, candidate);
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn join(
        &self,
        request: Request<chord_proto::NodeRefMsg>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        let bootstrap = node_ref_from_msg(request.into_inner());
        membership::join(&self.handle, &bootstrap).await?;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn leave_network(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        membership::leave_network(&self.handle).await?;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn update_predecessor(
        &self,
        request: Request<chord_proto::NodeRefMsg>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        let node = node_ref_from_msg(request.into_inner());
        membership::update_predecessor(&self.handle, node);
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn update_successor(
        &self,
        request: Request<chord_proto::NodeRefMsg>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        let node = node_ref_from_msg(request.into_inner());
        membership::update_successor(&self.handle, node);
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn update_predecessor_kv_store(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        membership::update_predecessor_kv_store(&self.handle).await?;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn update_successor_kv_store(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        membership::update_successor_kv_store(&self.handle).await?;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn get_all_data(
        &self,
        request: Request<chord_proto::GetAllDataRequest>,
    ) -> Result<Response<chord_proto::KvMapMsg>, Status> {
        let place: Place = request.into_inner().place.into();
        let entries = maintenance::snapshot(&self.handle, place);
        Ok(Response::new(chord_proto::KvMapMsg { entries }))
    }

    async fn is_successor_alive(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::BoolMsg>, Status> {
        let successor = self.handle.state.lock().unwrap().successor.clone();
        let alive = match dial(&successor, self.handle.config.rpc_timeout).await {
            Ok(mut client) => client.get_id(Request::new(chord_proto::Empty {})).await.is_ok(),
            Err(_) => false,
        };
        Ok(Response::new(chord_proto::BoolMsg { value: alive }))
    }

    async fn pause_stability_tests(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        self.handle.state.lock().unwrap().maintenance_paused = true;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn resume_stability_tests(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::Empty>, Status> {
        self.handle.state.lock().unwrap().maintenance_paused = false;
        Ok(Response::new(chord_proto::Empty {}))
    }

    async fn check_predecessor(
        &self,
        _request: Request<chord_proto::Empty>,
    ) -> Result<Response<chord_proto::NodeRefMsg>, Status> {
        let farthest = membership::walk_predecessor_chain(&self.handle).await;
        Ok(Response::new(node_ref_to_msg(&farthest)))
    }
}
